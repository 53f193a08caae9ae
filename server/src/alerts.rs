//! Client for the alert server.
//!
//! The alert server renders on-stream alerts and runs the dungeon minigame.
//! This service is purely a client of two of its endpoints:
//!
//! - `POST /api/dungeon/join` - add a weapon ball to the next dungeon
//! - `POST /api/alert/trigger` - show a message, media or effect alert
//!
//! # Failure Policy
//!
//! Every operation issues exactly one request with a bounded timeout. Any
//! transport failure or non-success status is returned as an [`AlertError`];
//! there is no retry and nothing to roll back.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use arena_ebs::alerts::AlertClient;
//!
//! let client = AlertClient::new("http://localhost:3000", Duration::from_secs(5))?;
//! client.trigger_tts("user-1", "hello chat").await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::spawn::{build_dungeon_ball, DungeonBall, SpawnSource, ThreadRngSpawn};
use crate::types::WeaponBall;

const DUNGEON_JOIN_PATH: &str = "/api/dungeon/join";
const ALERT_TRIGGER_PATH: &str = "/api/alert/trigger";

/// How long a TTS message stays on screen, in milliseconds.
const TTS_DURATION_MS: u64 = 5000;

/// Tag that makes the alert server render media fullscreen.
const FULLSCREEN_TAG: &str = "fullscreen";

/// Value of the `source` field on every alert we trigger.
const ALERT_SOURCE: &str = "extension";

/// Errors that can occur when calling the alert server.
#[derive(Debug, Error)]
pub enum AlertError {
    /// The request did not complete within the configured timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The alert server could not be reached.
    #[error("alert server unavailable: {0}")]
    Unavailable(String),

    /// The alert server answered with a non-success status.
    #[error("alert server rejected request with status {status}: {body}")]
    Rejected {
        /// HTTP status returned by the alert server.
        status: u16,
        /// Response body, for logging.
        body: String,
    },

    /// The HTTP client could not be built.
    #[error("client configuration error: {0}")]
    Configuration(String),
}

/// Body of `POST /api/dungeon/join`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DungeonJoinPayload {
    pub user_id: String,
    pub channel_id: String,
    pub ball: DungeonBall,
}

/// Kind of alert to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    Message,
    Media,
    Effect,
}

/// Per-type alert configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlertConfig {
    Message {
        message: String,
        duration: u64,
        tags: Vec<String>,
    },
    Media {
        url: String,
        tags: Vec<String>,
    },
    Effect {
        effect: String,
        tags: Vec<String>,
    },
}

/// Body of `POST /api/alert/trigger`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertTrigger {
    pub alert_type: AlertType,
    pub config: AlertConfig,
    pub source: String,
    pub user_id: String,
}

impl AlertTrigger {
    /// A text-to-speech message alert.
    pub fn message(user_id: &str, text: &str) -> Self {
        Self::new(
            AlertType::Message,
            AlertConfig::Message {
                message: text.to_string(),
                duration: TTS_DURATION_MS,
                tags: Vec::new(),
            },
            user_id,
        )
    }

    /// A fullscreen media alert. The URL is passed through unchecked.
    pub fn media(user_id: &str, url: &str) -> Self {
        Self::new(
            AlertType::Media,
            AlertConfig::Media {
                url: url.to_string(),
                tags: vec![FULLSCREEN_TAG.to_string()],
            },
            user_id,
        )
    }

    /// A named visual effect alert.
    pub fn effect(user_id: &str, effect: &str) -> Self {
        Self::new(
            AlertType::Effect,
            AlertConfig::Effect {
                effect: effect.to_string(),
                tags: Vec::new(),
            },
            user_id,
        )
    }

    fn new(alert_type: AlertType, config: AlertConfig, user_id: &str) -> Self {
        Self {
            alert_type,
            config,
            source: ALERT_SOURCE.to_string(),
            user_id: user_id.to_string(),
        }
    }
}

/// HTTP client for the alert server.
///
/// Cheap to clone; clones share the connection pool and spawn source.
#[derive(Clone)]
pub struct AlertClient {
    http_client: Client,
    base_url: String,
    timeout: Duration,
    spawn: Arc<dyn SpawnSource>,
}

impl AlertClient {
    /// Creates a client for the alert server at `base_url`.
    ///
    /// Trailing slashes are trimmed from the URL.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::Configuration`] if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AlertError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let http_client = Client::builder().timeout(timeout).build().map_err(|e| {
            AlertError::Configuration(format!("failed to create HTTP client: {e}"))
        })?;

        Ok(Self {
            http_client,
            base_url,
            timeout,
            spawn: Arc::new(ThreadRngSpawn),
        })
    }

    /// Replaces the source of spawn randomness.
    #[must_use]
    pub fn with_spawn_source(mut self, spawn: Arc<dyn SpawnSource>) -> Self {
        self.spawn = spawn;
        self
    }

    /// Returns the base URL of the alert server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Adds the user's weapon ball to the next dungeon.
    ///
    /// The ball is augmented with randomized position, velocity and team,
    /// full health and a weapon-dependent speed cap.
    pub async fn join_dungeon(
        &self,
        user_id: &str,
        channel_id: &str,
        ball: &WeaponBall,
    ) -> Result<DungeonJoinPayload, AlertError> {
        let payload = DungeonJoinPayload {
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            ball: build_dungeon_ball(user_id, ball, self.spawn.as_ref()),
        };

        self.post_json(DUNGEON_JOIN_PATH, &payload).await?;
        Ok(payload)
    }

    /// Shows `text` as a message alert.
    pub async fn trigger_tts(&self, user_id: &str, text: &str) -> Result<(), AlertError> {
        self.trigger(&AlertTrigger::message(user_id, text)).await
    }

    /// Plays the media at `url` fullscreen.
    pub async fn trigger_media(&self, user_id: &str, url: &str) -> Result<(), AlertError> {
        self.trigger(&AlertTrigger::media(user_id, url)).await
    }

    /// Plays the named effect.
    pub async fn trigger_effect(&self, user_id: &str, effect: &str) -> Result<(), AlertError> {
        self.trigger(&AlertTrigger::effect(user_id, effect)).await
    }

    async fn trigger(&self, alert: &AlertTrigger) -> Result<(), AlertError> {
        self.post_json(ALERT_TRIGGER_PATH, alert).await
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), AlertError> {
        let url = format!("{}{}", self.base_url, path);

        debug!(url = %url, "Posting to alert server");

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AlertError::Timeout(self.timeout)
                } else if e.is_connect() {
                    AlertError::Unavailable(format!("connection failed: {e}"))
                } else {
                    AlertError::Unavailable(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, url = %url, "Alert server rejected request");
            return Err(AlertError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = %status, url = %url, "Alert server accepted request");
        Ok(())
    }
}

impl std::fmt::Debug for AlertClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Always returns the same draw.
    struct Fixed(f64);

    impl SpawnSource for Fixed {
        fn next_unit(&self) -> f64 {
            self.0
        }
    }

    fn create_test_client(mock_server: &MockServer) -> AlertClient {
        AlertClient::new(mock_server.uri(), Duration::from_secs(2))
            .expect("failed to create test client")
            .with_spawn_source(Arc::new(Fixed(0.25)))
    }

    fn ball(weapon: &str) -> WeaponBall {
        WeaponBall {
            name: "Pip".to_string(),
            weapon: weapon.to_string(),
            color: "#abcdef".to_string(),
        }
    }

    #[test]
    fn new_trims_trailing_slash() {
        let client = AlertClient::new("http://alerts.local//", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://alerts.local");
    }

    #[test]
    fn alert_trigger_shapes() {
        assert_eq!(
            serde_json::to_value(AlertTrigger::message("u1", "hi")).unwrap(),
            json!({
                "alertType": "message",
                "config": {"message": "hi", "duration": 5000, "tags": []},
                "source": "extension",
                "userId": "u1"
            })
        );
        assert_eq!(
            serde_json::to_value(AlertTrigger::media("u1", "https://youtu.be/x")).unwrap(),
            json!({
                "alertType": "media",
                "config": {"url": "https://youtu.be/x", "tags": ["fullscreen"]},
                "source": "extension",
                "userId": "u1"
            })
        );
        assert_eq!(
            serde_json::to_value(AlertTrigger::effect("u1", "confetti")).unwrap(),
            json!({
                "alertType": "effect",
                "config": {"effect": "confetti", "tags": []},
                "source": "extension",
                "userId": "u1"
            })
        );
    }

    #[tokio::test]
    async fn trigger_tts_posts_message_alert() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/alert/trigger"))
            .and(body_json(json!({
                "alertType": "message",
                "config": {"message": "hello chat", "duration": 5000, "tags": []},
                "source": "extension",
                "userId": "u1"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        client.trigger_tts("u1", "hello chat").await.unwrap();
    }

    #[tokio::test]
    async fn trigger_media_posts_fullscreen_alert() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/alert/trigger"))
            .and(body_json(json!({
                "alertType": "media",
                "config": {"url": "not even a url", "tags": ["fullscreen"]},
                "source": "extension",
                "userId": "u1"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        client.trigger_media("u1", "not even a url").await.unwrap();
    }

    #[tokio::test]
    async fn trigger_effect_posts_effect_alert() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/alert/trigger"))
            .and(body_json(json!({
                "alertType": "effect",
                "config": {"effect": "shake", "tags": []},
                "source": "extension",
                "userId": "u2"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        client.trigger_effect("u2", "shake").await.unwrap();
    }

    #[tokio::test]
    async fn join_dungeon_posts_augmented_ball() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/dungeon/join"))
            .and(body_json(json!({
                "userId": "u1",
                "channelId": "c1",
                "ball": {
                    "id": "u1",
                    "name": "Pip",
                    "weapon": {"type": "unarmed"},
                    "color": "#abcdef",
                    "x": 150.0,
                    "y": 150.0,
                    "vx": -1.0,
                    "vy": -1.0,
                    "hp": 100,
                    "maxHp": 100,
                    "size": 20,
                    "team": 1,
                    "maxSpeed": 3
                }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let payload = client
            .join_dungeon("u1", "c1", &ball("unarmed"))
            .await
            .unwrap();
        assert_eq!(payload.ball.max_speed, 3);
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/alert/trigger"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let err = client.trigger_tts("u1", "hi").await.unwrap_err();
        assert!(matches!(err, AlertError::Rejected { status: 503, ref body } if body == "busy"));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/alert/trigger"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&mock_server)
            .await;

        let client = AlertClient::new(mock_server.uri(), Duration::from_millis(50)).unwrap();
        let err = client.trigger_effect("u1", "shake").await.unwrap_err();
        assert!(matches!(err, AlertError::Timeout(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = AlertClient::new(format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let err = client.trigger_tts("u1", "hi").await.unwrap_err();
        assert!(matches!(err, AlertError::Unavailable(_)));
    }
}
