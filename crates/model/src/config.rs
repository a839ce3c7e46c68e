//! Store configuration.

use serde::{Deserialize, Serialize};
use tessera_state::UnhandledPolicy;

use crate::error::ModelError;

/// Tunables for a [`Store`](crate::Store).
///
/// ```toml
/// # Reject events the current lifecycle state does not handle instead of
/// # ignoring them.
/// unhandled_event = "reject"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Policy for events no state on the path to the root handles.
    /// Terminal states reject regardless of this setting.
    pub unhandled_event: UnhandledPolicy,
}

impl StoreConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ModelError> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = StoreConfig::from_toml_str("").unwrap();
        assert_eq!(config.unhandled_event, UnhandledPolicy::Ignore);
    }

    #[test]
    fn reject_policy_parses() {
        let config = StoreConfig::from_toml_str("unhandled_event = \"reject\"\n").unwrap();
        assert_eq!(config.unhandled_event, UnhandledPolicy::Reject);
    }

    #[test]
    fn unknown_key_is_an_error() {
        match StoreConfig::from_toml_str("unhandled = \"reject\"") {
            Err(ModelError::Config(_)) => {}
            other => panic!("expected Config error, got {:?}", other),
        }
    }
}
