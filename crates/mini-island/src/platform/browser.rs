//! Browser platform: web-sys implementations of every capability and the
//! `<mini-island>` custom element.
//!
//! ```ignore
//! #[wasm_bindgen(start)]
//! pub fn start() {
//!     let _ = mini_island::platform::browser::register();
//! }
//! ```

pub mod element;
pub mod idle;
pub mod media;
pub mod registration;
pub mod visibility;

use std::rc::Rc;

use crate::host::Capabilities;

pub use element::BrowserElement;
pub use idle::BrowserIdleScheduler;
pub use media::BrowserMediaMatcher;
pub use registration::{register, register_registry, register_with};
pub use visibility::BrowserVisibilityObserver;

/// Every provider the current window supports. Missing ones stay `None`,
/// which makes their conditions satisfied immediately.
pub fn browser_capabilities() -> Capabilities<BrowserElement> {
    let mut capabilities = Capabilities::none();
    if let Some(media) = BrowserMediaMatcher::detect() {
        capabilities = capabilities.with_media(Rc::new(media));
    }
    if let Some(visibility) = BrowserVisibilityObserver::detect() {
        capabilities = capabilities.with_visibility(Rc::new(visibility));
    }
    if let Some(idle) = BrowserIdleScheduler::detect() {
        capabilities = capabilities.with_idle(Rc::new(idle));
    }
    capabilities
}

/// Whether `window[name]` exists.
fn window_has(window: &web_sys::Window, name: &str) -> bool {
    js_sys::Reflect::get(window, &wasm_bindgen::JsValue::from_str(name))
        .map(|value| !value.is_undefined() && !value.is_null())
        .unwrap_or(false)
}
