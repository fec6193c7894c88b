//! Island configuration.
//!
//! The defaults match the markup surface:
//!
//! ```html
//! <mini-island client:visible client:media="(min-width: 600px)">
//!     <template data-island>...</template>
//! </mini-island>
//! ```

use serde::Deserialize;

use crate::error::IslandError;

pub const DEFAULT_TAG_NAME: &str = "mini-island";
pub const DEFAULT_TEMPLATE_TAG: &str = "template";
pub const DEFAULT_MARKER_ATTRIBUTE: &str = "data-island";
pub const DEFAULT_CONDITION_PREFIX: &str = "client:";

/// How the `idle` condition waits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleStrategy {
    /// Satisfied as soon as it is evaluated.
    #[default]
    Immediate,
    /// Wait for the host's idle scheduler (`requestIdleCallback` in browsers).
    /// Falls back to `Immediate` when the host has no scheduler.
    Scheduler,
}

/// Names and markers an island reads from its host markup.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IslandConfig {
    /// Custom element tag the island is registered under.
    pub tag_name: String,
    /// Tag of inert content blocks.
    pub template_tag: String,
    /// Attribute marking a block as owned by the enclosing island.
    pub marker_attribute: String,
    /// Prefix of condition attributes (`client:` + condition name).
    pub condition_prefix: String,
    pub idle: IdleStrategy,
}

impl IslandConfig {
    /// Parse a JSON config object. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, IslandError> {
        serde_json::from_str(json).map_err(|error| IslandError::Config(error.to_string()))
    }

    /// Attribute name declaring the given condition, e.g. `client:media`.
    pub fn condition_attribute(&self, condition: &str) -> String {
        format!("{}{}", self.condition_prefix, condition)
    }
}

impl Default for IslandConfig {
    fn default() -> Self {
        Self {
            tag_name: DEFAULT_TAG_NAME.to_string(),
            template_tag: DEFAULT_TEMPLATE_TAG.to_string(),
            marker_attribute: DEFAULT_MARKER_ATTRIBUTE.to_string(),
            condition_prefix: DEFAULT_CONDITION_PREFIX.to_string(),
            idle: IdleStrategy::default(),
        }
    }
}
