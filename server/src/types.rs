//! Shared data types for the extension backend.
//!
//! Profile types are what the store holds and what `GET /user/:userId`
//! returns. Request types are the JSON bodies accepted by the routes; each
//! has a `validate` method that rejects missing or empty required fields.
//! All JSON uses camelCase field names.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Weapon value that selects the reduced speed cap in the dungeon.
pub const WEAPON_UNARMED: &str = "unarmed";

const DEFAULT_WEAPON: &str = "sword";
const DEFAULT_COLOR: &str = "#ff6b6b";

/// A user's avatar configuration in the dungeon minigame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponBall {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_weapon")]
    pub weapon: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_weapon() -> String {
    DEFAULT_WEAPON.to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl Default for WeaponBall {
    fn default() -> Self {
        Self {
            name: String::new(),
            weapon: default_weapon(),
            color: default_color(),
        }
    }
}

impl WeaponBall {
    /// Returns true when the ball carries no weapon.
    pub fn is_unarmed(&self) -> bool {
        self.weapon == WEAPON_UNARMED
    }
}

/// Lifetime dungeon statistics for a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub dungeons_won: u64,
    pub duels_won: u64,
    pub bosses_killed: u64,
    pub deaths: u64,
    /// Opaque loot items, in the order the alert server reported them.
    pub loot: Vec<Value>,
}

impl UserStats {
    /// Overwrites every field present in `update`, leaving the rest untouched.
    pub fn apply(&mut self, update: StatsUpdate) {
        if let Some(v) = update.dungeons_won {
            self.dungeons_won = v;
        }
        if let Some(v) = update.duels_won {
            self.duels_won = v;
        }
        if let Some(v) = update.bosses_killed {
            self.bosses_killed = v;
        }
        if let Some(v) = update.deaths {
            self.deaths = v;
        }
        if let Some(loot) = update.loot {
            self.loot = loot;
        }
    }
}

/// Partial stats reported by the alert server when a dungeon ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dungeons_won: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duels_won: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bosses_killed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deaths: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loot: Option<Vec<Value>>,
}

/// Everything the service remembers about a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub weapon_ball: WeaponBall,
    pub stats: UserStats,
}

// ============================================================================
// Request bodies
// ============================================================================

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("'{field}' must not be empty"))
    } else {
        Ok(())
    }
}

/// Body of `POST /ball/save`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveBallRequest {
    pub user_id: String,
    pub ball: WeaponBall,
}

impl SaveBallRequest {
    pub fn validate(&self) -> Result<(), String> {
        require("userId", &self.user_id)
    }
}

/// Body of `POST /dungeon/join`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DungeonJoinRequest {
    pub user_id: String,
    pub channel_id: String,
    pub ball: WeaponBall,
}

impl DungeonJoinRequest {
    pub fn validate(&self) -> Result<(), String> {
        require("userId", &self.user_id)?;
        require("channelId", &self.channel_id)
    }
}

/// Body of `POST /redeem/tts`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TtsRedeemRequest {
    pub user_id: String,
    pub channel_id: String,
    pub text: String,
}

impl TtsRedeemRequest {
    pub fn validate(&self) -> Result<(), String> {
        require("userId", &self.user_id)?;
        require("channelId", &self.channel_id)?;
        require("text", &self.text)
    }
}

/// Body of `POST /redeem/media`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRedeemRequest {
    pub user_id: String,
    pub channel_id: String,
    pub url: String,
}

impl MediaRedeemRequest {
    pub fn validate(&self) -> Result<(), String> {
        require("userId", &self.user_id)?;
        require("channelId", &self.channel_id)?;
        require("url", &self.url)
    }
}

/// Body of `POST /redeem/effect`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectRedeemRequest {
    pub user_id: String,
    pub channel_id: String,
    pub effect: String,
}

impl EffectRedeemRequest {
    pub fn validate(&self) -> Result<(), String> {
        require("userId", &self.user_id)?;
        require("channelId", &self.channel_id)?;
        require("effect", &self.effect)
    }
}

/// Body of `POST /stats/update`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsUpdateRequest {
    pub user_id: String,
    pub stats_update: StatsUpdate,
}

impl StatsUpdateRequest {
    pub fn validate(&self) -> Result<(), String> {
        require("userId", &self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_profile_matches_fresh_user() {
        let profile = UserProfile::default();
        assert_eq!(profile.weapon_ball.name, "");
        assert_eq!(profile.weapon_ball.weapon, "sword");
        assert_eq!(profile.weapon_ball.color, "#ff6b6b");
        assert_eq!(profile.stats.deaths, 0);
        assert!(profile.stats.loot.is_empty());
    }

    #[test]
    fn profile_serializes_camel_case() {
        let value = serde_json::to_value(UserProfile::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "weaponBall": {"name": "", "weapon": "sword", "color": "#ff6b6b"},
                "stats": {
                    "dungeonsWon": 0,
                    "duelsWon": 0,
                    "bossesKilled": 0,
                    "deaths": 0,
                    "loot": []
                }
            })
        );
    }

    #[test]
    fn weapon_ball_fills_missing_fields() {
        let ball: WeaponBall = serde_json::from_value(json!({"name": "Bonk"})).unwrap();
        assert_eq!(ball.name, "Bonk");
        assert_eq!(ball.weapon, "sword");
        assert_eq!(ball.color, "#ff6b6b");
        assert!(!ball.is_unarmed());
    }

    #[test]
    fn apply_overwrites_only_present_fields() {
        let mut stats = UserStats {
            dungeons_won: 3,
            duels_won: 2,
            bosses_killed: 1,
            deaths: 7,
            loot: vec![json!("shield")],
        };

        let update: StatsUpdate =
            serde_json::from_value(json!({"deaths": 1, "loot": [{"id": "gem"}]})).unwrap();
        stats.apply(update);

        assert_eq!(stats.dungeons_won, 3);
        assert_eq!(stats.duels_won, 2);
        assert_eq!(stats.bosses_killed, 1);
        assert_eq!(stats.deaths, 1);
        assert_eq!(stats.loot, vec![json!({"id": "gem"})]);
    }

    #[test]
    fn apply_is_overwrite_not_additive() {
        let mut stats = UserStats::default();
        let update = StatsUpdate {
            deaths: Some(1),
            ..Default::default()
        };
        stats.apply(update.clone());
        stats.apply(update);
        assert_eq!(stats.deaths, 1);
    }

    #[test]
    fn request_validation_rejects_blank_fields() {
        let req: TtsRedeemRequest = serde_json::from_value(
            json!({"userId": "u1", "channelId": "c1", "text": "   "}),
        )
        .unwrap();
        assert_eq!(req.validate().unwrap_err(), "'text' must not be empty");

        let req: DungeonJoinRequest = serde_json::from_value(
            json!({"userId": "u1", "channelId": "", "ball": {}}),
        )
        .unwrap();
        assert_eq!(req.validate().unwrap_err(), "'channelId' must not be empty");
    }

    #[test]
    fn request_missing_required_field_fails_to_parse() {
        let result: Result<SaveBallRequest, _> = serde_json::from_value(json!({"userId": "u1"}));
        assert!(result.is_err());
    }
}
