use serde::{Deserialize, Serialize};

use crate::ops::filter_bank::FilterParams;

/// Configuration from larch.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LarchConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Saved views, selectable with `--view NAME`
    #[serde(default)]
    pub views: Vec<ViewConfig>,
}

impl LarchConfig {
    pub fn view(&self, name: &str) -> Option<&ViewConfig> {
        self.views.iter().find(|v| v.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default: "warn". Overridden by `-v` and by RUST_LOG.
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    pub name: String,
    #[serde(default)]
    pub filters: Vec<FilterRef>,
}

/// A filter applied by a saved view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<FilterParams>,
}
