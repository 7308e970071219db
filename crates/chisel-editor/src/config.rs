//! Editor configuration.
//!
//! Passed explicitly into `Document::new` and shared with the selection
//! engine. Loaded from JSON; every field has a default so partial files work.

use crate::error::EditorError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Multi-mode picks show an explicit confirm/cancel control. Default: **true**.
    pub show_selection_confirm: bool,

    /// Resolve a pick on the first non-empty selection change, when the
    /// explicit control is not shown for that pick. Default: **false**.
    pub auto_confirm_selection: bool,

    /// Maximum undo entries; the oldest are dropped. Default: **50**.
    pub history_depth: usize,

    /// Hit radius for edges and vertices, in world units. Default: **3.0**.
    pub pick_tolerance: f64,

    pub snap: SnapConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            show_selection_confirm: true,
            auto_confirm_selection: false,
            history_depth: 50,
            pick_tolerance: 3.0,
            snap: SnapConfig::default(),
        }
    }
}

impl EditorConfig {
    pub fn from_json(text: &str) -> Result<Self, EditorError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, EditorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Which snap kinds are offered, and how far they reach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapConfig {
    /// Default: **5.0** world units.
    pub tolerance: f64,
    pub endpoint: bool,
    pub midpoint: bool,
    pub center: bool,
    pub intersection: bool,
    /// Command-supplied feature points.
    pub feature: bool,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            tolerance: 5.0,
            endpoint: true,
            midpoint: true,
            center: true,
            intersection: true,
            feature: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            EditorConfig::from_json(r#"{ "autoConfirmSelection": true, "snap": { "midpoint": false } }"#)
                .unwrap();
        assert!(config.auto_confirm_selection);
        assert!(config.show_selection_confirm);
        assert!(!config.snap.midpoint);
        assert_eq!(config.snap.tolerance, 5.0);
        assert_eq!(config.history_depth, 50);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            EditorConfig::from_json("{ historyDepth: }"),
            Err(EditorError::Config(_))
        ));
    }

    #[test]
    fn json_roundtrip() {
        let config = EditorConfig {
            history_depth: 7,
            ..EditorConfig::default()
        };
        let back = EditorConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
