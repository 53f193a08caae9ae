//! Per-user profile storage.
//!
//! Route handlers only see the [`UserStore`] trait, so a durable backend can
//! replace [`InMemoryUserStore`] without touching route logic.
//!
//! # Semantics
//!
//! - Reads never fail: an unknown user yields [`UserProfile::default`], which
//!   is *not* persisted.
//! - `save_ball` replaces the weapon ball and keeps any existing stats.
//! - `merge_stats` overwrites the fields present in the update, last writer
//!   wins. There is no versioning or conflict detection.
//!
//! # Thread Safety
//!
//! [`InMemoryUserStore`] guards its map with a [`RwLock`] held for a single
//! operation at a time. Nothing is held across an `.await`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, trace};

use crate::types::{StatsUpdate, UserProfile, UserStats, WeaponBall};

/// Storage operations used by the route layer.
pub trait UserStore: Send + Sync {
    /// Returns the stored profile, or a default one for unknown users.
    fn get(&self, user_id: &str) -> UserProfile;

    /// Stores `ball` as the user's weapon ball, creating the profile if needed.
    fn save_ball(&self, user_id: &str, ball: WeaponBall);

    /// Overwrites the provided stats fields, creating the profile if needed.
    fn merge_stats(&self, user_id: &str, update: StatsUpdate);

    /// Returns the user's stats, zeroed for unknown users.
    fn stats(&self, user_id: &str) -> UserStats {
        self.get(user_id).stats
    }
}

/// Process-lifetime profile store. Not bounded, never evicts.
#[derive(Default)]
pub struct InMemoryUserStore {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users with a stored profile.
    pub fn len(&self) -> usize {
        self.profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no profile has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if a profile has been stored for `user_id`.
    pub fn contains(&self, user_id: &str) -> bool {
        self.profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(user_id)
    }
}

impl UserStore for InMemoryUserStore {
    fn get(&self, user_id: &str) -> UserProfile {
        let profiles = self.profiles.read().unwrap_or_else(PoisonError::into_inner);
        match profiles.get(user_id) {
            Some(profile) => profile.clone(),
            None => {
                trace!(user_id = %user_id, "No stored profile, returning defaults");
                UserProfile::default()
            }
        }
    }

    fn save_ball(&self, user_id: &str, ball: WeaponBall) {
        let mut profiles = self
            .profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        debug!(user_id = %user_id, weapon = %ball.weapon, "Saving weapon ball");
        profiles.entry(user_id.to_string()).or_default().weapon_ball = ball;
    }

    fn merge_stats(&self, user_id: &str, update: StatsUpdate) {
        let mut profiles = self
            .profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        debug!(user_id = %user_id, update = ?update, "Merging stats");
        profiles
            .entry(user_id.to_string())
            .or_default()
            .stats
            .apply(update);
    }
}

impl std::fmt::Debug for InMemoryUserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryUserStore")
            .field("profile_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn axe_ball() -> WeaponBall {
        WeaponBall {
            name: "Grog".to_string(),
            weapon: "axe".to_string(),
            color: "#00ff00".to_string(),
        }
    }

    #[test]
    fn get_unknown_returns_default_without_persisting() {
        let store = InMemoryUserStore::new();
        let profile = store.get("ghost");

        assert_eq!(profile, UserProfile::default());
        assert!(store.is_empty());
        assert!(!store.contains("ghost"));
    }

    #[test]
    fn save_ball_creates_profile_with_zeroed_stats() {
        let store = InMemoryUserStore::new();
        store.save_ball("u1", axe_ball());

        let profile = store.get("u1");
        assert_eq!(profile.weapon_ball, axe_ball());
        assert_eq!(profile.stats, UserStats::default());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn save_ball_preserves_existing_stats() {
        let store = InMemoryUserStore::new();
        store.merge_stats(
            "u1",
            StatsUpdate {
                dungeons_won: Some(4),
                loot: Some(vec![json!("crown")]),
                ..Default::default()
            },
        );

        store.save_ball("u1", axe_ball());

        let profile = store.get("u1");
        assert_eq!(profile.weapon_ball, axe_ball());
        assert_eq!(profile.stats.dungeons_won, 4);
        assert_eq!(profile.stats.loot, vec![json!("crown")]);
    }

    #[test]
    fn merge_stats_persists_default_ball_for_new_user() {
        let store = InMemoryUserStore::new();
        store.merge_stats(
            "u2",
            StatsUpdate {
                deaths: Some(2),
                ..Default::default()
            },
        );

        let profile = store.get("u2");
        assert_eq!(profile.weapon_ball, WeaponBall::default());
        assert_eq!(profile.stats.deaths, 2);
        assert!(store.contains("u2"));
    }

    #[test]
    fn merge_stats_overwrites_rather_than_adds() {
        let store = InMemoryUserStore::new();
        let update = StatsUpdate {
            deaths: Some(1),
            ..Default::default()
        };

        store.merge_stats("u1", update.clone());
        store.merge_stats("u1", update);

        assert_eq!(store.stats("u1").deaths, 1);
    }

    #[test]
    fn stats_for_unknown_user_are_zeroed() {
        let store = InMemoryUserStore::new();
        assert_eq!(store.stats("nobody"), UserStats::default());
    }

    #[test]
    fn one_entry_per_user() {
        let store = InMemoryUserStore::new();
        store.save_ball("u1", axe_ball());
        store.save_ball("u1", WeaponBall::default());
        store.merge_stats("u1", StatsUpdate::default());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("u1").weapon_ball, WeaponBall::default());
    }

    #[test]
    fn concurrent_writers_keep_single_entry() {
        let store = Arc::new(InMemoryUserStore::new());
        let handles: Vec<_> = (0..8u64)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store.merge_stats(
                        "shared",
                        StatsUpdate {
                            duels_won: Some(i),
                            ..Default::default()
                        },
                    );
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1);
        assert!(store.stats("shared").duels_won < 8);
    }

    #[test]
    fn usable_as_trait_object() {
        let store: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
        store.save_ball("u1", axe_ball());
        assert_eq!(store.get("u1").weapon_ball.name, "Grog");
    }

    #[test]
    fn debug_reports_count() {
        let store = InMemoryUserStore::new();
        store.save_ball("u1", axe_ball());
        assert!(format!("{store:?}").contains("profile_count: 1"));
    }
}
