//! Layered configuration surface for the knobs this crate leaves open as
//! tunables rather than hard constants.

use serde::{Deserialize, Serialize};

/// Engine-wide configuration, constructed directly or loaded from a
/// TOML/JSON file the same way the reference configuration surface loads
/// settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Backs the `check` parameter default of
    /// [`Hierarchy::add_typing`](crate::hierarchy::Hierarchy::add_typing).
    pub check_typing_on_add: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { check_typing_on_add: true }
    }
}

impl EngineConfig {
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_checks_typing_on_add() {
        assert!(EngineConfig::default().check_typing_on_add);
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let cfg = EngineConfig::from_json("{}").unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }
}
