//! `window.matchMedia` provider.

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::Closure;
use web_sys::{MediaQueryList, MediaQueryListEvent, Window};

use crate::condition::ConditionKind;
use crate::error::IslandError;
use crate::host::{ChangeListener, MediaMatcher};
use crate::signal::Subscription;

pub struct BrowserMediaMatcher {
    window: Window,
}

impl BrowserMediaMatcher {
    /// `None` when the window has no `matchMedia`.
    pub fn detect() -> Option<Self> {
        let window = web_sys::window()?;
        super::window_has(&window, "matchMedia").then_some(Self { window })
    }

    fn query_list(&self, query: &str) -> Result<MediaQueryList, IslandError> {
        self.window
            .match_media(query)
            .map_err(|error| IslandError::evaluator(ConditionKind::Media.name(), format!("{error:?}")))?
            .ok_or_else(|| {
                IslandError::evaluator(
                    ConditionKind::Media.name(),
                    format!("matchMedia returned null for '{query}'"),
                )
            })
    }
}

impl MediaMatcher for BrowserMediaMatcher {
    fn matches(&self, query: &str) -> Result<bool, IslandError> {
        Ok(self.query_list(query)?.matches())
    }

    fn watch(&self, query: &str, mut listener: ChangeListener) -> Result<Subscription, IslandError> {
        let list = self.query_list(query)?;
        // The listener can't unregister itself; it goes quiet and the
        // subscription removes it.
        let mut stopped = false;
        let closure = Closure::wrap(Box::new(move |event: MediaQueryListEvent| {
            if stopped {
                return;
            }
            if listener(event.matches()).is_break() {
                stopped = true;
            }
        }) as Box<dyn FnMut(MediaQueryListEvent)>);

        list.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref())
            .map_err(|error| IslandError::evaluator(ConditionKind::Media.name(), format!("{error:?}")))?;

        Ok(Subscription::new(move || {
            let _ = list.remove_event_listener_with_callback("change", closure.as_ref().unchecked_ref());
        }))
    }
}
