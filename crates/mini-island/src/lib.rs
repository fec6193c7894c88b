//! Condition-gated lazy hydration.
//!
//! An island wraps inert `<template data-island>` blocks and reveals them
//! once every condition declared on it (`client:media`, `client:idle`,
//! `client:visible`) is satisfied.
//!
//! ```text
//! host attaches Island
//!        ↓
//! ConditionRegistry::declared_conditions  →  one ConditionSignal per condition
//!        ↓
//! join barrier (all signals)
//!        ↓
//! reveal: template blocks replaced by their content
//! ```

pub mod condition;
pub mod config;
pub mod error;
pub mod host;
pub mod island;
pub mod platform;
pub mod signal;

pub use condition::{ConditionEvaluator, ConditionKind, ConditionRegistry, DeclaredConditions};
pub use config::{IdleStrategy, IslandConfig};
pub use error::IslandError;
pub use host::{Capabilities, IdleScheduler, IslandElement, MediaMatcher, VisibilityObserver};
pub use island::{Activation, Island, IslandState};
pub use signal::{ConditionSignal, PendingSignal, SignalResolver, Subscription};
