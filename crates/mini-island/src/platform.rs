//! Host platforms.
//!
//! - `memory`: in-memory element tree with scriptable providers
//! - `browser`: web-sys DOM, `matchMedia`, `IntersectionObserver`,
//!   `requestIdleCallback` and custom element registration

pub mod memory;

#[cfg(feature = "browser")]
pub mod browser;
