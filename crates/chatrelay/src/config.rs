//! Relay configuration.

use chatrelay_chain::DEFAULT_DELAYED_ACK_FLOOR;
use chatrelay_pipeline::SigningMode;
use serde::{Deserialize, Serialize};

/// Disconnect text shown to a player whose chain an extension broke.
pub const DEFAULT_ILLEGAL_STATE_MESSAGE: &str =
    "A proxy plugin caused an illegal protocol state. Contact your network administrator.";

/// Upper bound for [`RelayConfig::delayed_ack_floor`].
pub const MAX_DELAYED_ACK_FLOOR: u32 = 1024;

/// Configuration shared by every connection of a relay.
///
/// Missing fields take their defaults when deserialized, so a config file
/// only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// How the backend verifies chat.
    ///
    /// Default: `Session`. Under `Keyed`, rewriting a signed message
    /// disconnects the player.
    pub signing_mode: SigningMode,

    /// Standalone acknowledgements held back before any are forwarded.
    ///
    /// Default: 20.
    pub delayed_ack_floor: u32,

    /// Disconnect text for an illegal protocol state.
    pub illegal_state_message: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            signing_mode: SigningMode::default(),
            delayed_ack_floor: DEFAULT_DELAYED_ACK_FLOOR,
            illegal_state_message: DEFAULT_ILLEGAL_STATE_MESSAGE.to_owned(),
        }
    }
}

impl RelayConfig {
    /// Returns the config with out-of-range values replaced.
    ///
    /// The floor is capped at [`MAX_DELAYED_ACK_FLOOR`] and an empty
    /// disconnect message falls back to the default. Each replacement is
    /// logged.
    pub fn validated(mut self) -> Self {
        if self.delayed_ack_floor > MAX_DELAYED_ACK_FLOOR {
            tracing::warn!(
                requested = self.delayed_ack_floor,
                max = MAX_DELAYED_ACK_FLOOR,
                "delayed_ack_floor too large, capping"
            );
            self.delayed_ack_floor = MAX_DELAYED_ACK_FLOOR;
        }
        if self.illegal_state_message.trim().is_empty() {
            tracing::warn!("illegal_state_message is empty, using the default");
            self.illegal_state_message = DEFAULT_ILLEGAL_STATE_MESSAGE.to_owned();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_config_default() {
        let config = RelayConfig::default();
        assert_eq!(config.signing_mode, SigningMode::Session);
        assert_eq!(config.delayed_ack_floor, 20);
        assert_eq!(config.illegal_state_message, DEFAULT_ILLEGAL_STATE_MESSAGE);
    }

    #[test]
    fn test_relay_config_partial_json() {
        let config: RelayConfig =
            serde_json::from_str(r#"{ "signing_mode": "keyed" }"#).unwrap();
        assert_eq!(config.signing_mode, SigningMode::Keyed);
        assert_eq!(config.delayed_ack_floor, 20);
    }

    #[test]
    fn test_validated_caps_floor() {
        let config = RelayConfig {
            delayed_ack_floor: 100_000,
            ..RelayConfig::default()
        }
        .validated();
        assert_eq!(config.delayed_ack_floor, MAX_DELAYED_ACK_FLOOR);
    }

    #[test]
    fn test_validated_restores_empty_message() {
        let config = RelayConfig {
            illegal_state_message: "  ".into(),
            ..RelayConfig::default()
        }
        .validated();
        assert_eq!(config.illegal_state_message, DEFAULT_ILLEGAL_STATE_MESSAGE);
    }

    #[test]
    fn test_validated_keeps_valid_config() {
        let config = RelayConfig {
            signing_mode: SigningMode::Keyed,
            delayed_ack_floor: 0,
            illegal_state_message: "bye".into(),
        };
        assert_eq!(config.clone().validated(), config);
    }
}
