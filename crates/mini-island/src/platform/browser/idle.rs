//! `requestIdleCallback` provider.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::Closure;
use web_sys::Window;

use crate::condition::ConditionKind;
use crate::error::IslandError;
use crate::host::IdleScheduler;
use crate::signal::Subscription;

pub struct BrowserIdleScheduler {
    window: Window,
}

impl BrowserIdleScheduler {
    /// `None` when the window has no `requestIdleCallback` (Safari).
    pub fn detect() -> Option<Self> {
        let window = web_sys::window()?;
        super::window_has(&window, "requestIdleCallback").then_some(Self { window })
    }
}

impl IdleScheduler for BrowserIdleScheduler {
    fn schedule(&self, callback: Box<dyn FnOnce()>) -> Result<Subscription, IslandError> {
        let closure = Closure::once(move || callback());
        let handle = self
            .window
            .request_idle_callback(closure.as_ref().unchecked_ref())
            .map_err(|error| IslandError::evaluator(ConditionKind::Idle.name(), format!("{error:?}")))?;

        let window = self.window.clone();
        Ok(Subscription::new(move || {
            // No-op when the callback already ran.
            window.cancel_idle_callback(handle);
            drop(closure);
        }))
    }
}
