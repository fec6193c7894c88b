//! `IntersectionObserver` provider. One observer per observed element.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::Closure;
use web_sys::{IntersectionObserver, IntersectionObserverEntry};

use super::element::BrowserElement;
use crate::condition::ConditionKind;
use crate::error::IslandError;
use crate::host::{ChangeListener, VisibilityObserver};
use crate::signal::Subscription;

pub struct BrowserVisibilityObserver {
    _private: (),
}

impl BrowserVisibilityObserver {
    /// `None` when the window has no `IntersectionObserver`.
    pub fn detect() -> Option<Self> {
        let window = web_sys::window()?;
        super::window_has(&window, "IntersectionObserver").then_some(Self { _private: () })
    }
}

impl VisibilityObserver<BrowserElement> for BrowserVisibilityObserver {
    fn observe(&self, target: &BrowserElement, mut listener: ChangeListener) -> Result<Subscription, IslandError> {
        let mut stopped = false;
        let callback = Closure::wrap(Box::new(move |entries: js_sys::Array, observer: IntersectionObserver| {
            if stopped {
                return;
            }
            for entry in entries.iter() {
                let entry: IntersectionObserverEntry = entry.unchecked_into();
                if listener(entry.is_intersecting()).is_break() {
                    stopped = true;
                    observer.unobserve(&entry.target());
                    return;
                }
            }
        }) as Box<dyn FnMut(js_sys::Array, IntersectionObserver)>);

        let observer = IntersectionObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|error| IslandError::evaluator(ConditionKind::Visible.name(), format!("{error:?}")))?;
        observer.observe(&target.0);

        Ok(Subscription::new(move || {
            observer.disconnect();
            drop(callback);
        }))
    }
}
