//! Error taxonomy shared by the core and the platforms.

/// Error raised by a capability provider, an evaluator or the reveal step.
///
/// Most of these never reach the content author: the condition registry
/// absorbs evaluator errors into satisfied signals, and missing providers
/// degrade before an error is ever constructed. Only registration and reveal
/// failures are returned to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IslandError {
    /// A required host capability (custom element registry, media matcher,
    /// visibility observer, idle scheduler) is missing.
    CapabilityUnavailable(&'static str),
    /// A condition evaluator or the provider behind it failed.
    Evaluator { condition: String, message: String },
    /// An inert block could not be replaced by its content.
    Reveal(String),
    /// The custom element could not be defined.
    Registration(String),
    /// The configuration could not be parsed.
    Config(String),
}

impl IslandError {
    pub fn evaluator(condition: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Evaluator {
            condition: condition.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for IslandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IslandError::CapabilityUnavailable(name) => {
                write!(f, "capability unavailable: {name}")
            }
            IslandError::Evaluator { condition, message } => {
                write!(f, "condition '{condition}' failed: {message}")
            }
            IslandError::Reveal(message) => write!(f, "reveal failed: {message}"),
            IslandError::Registration(message) => write!(f, "registration failed: {message}"),
            IslandError::Config(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl std::error::Error for IslandError {}
