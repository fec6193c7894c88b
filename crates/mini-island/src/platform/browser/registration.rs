//! Custom element registration.
//!
//! The element class is a tiny JS shim whose lifecycle callbacks forward to
//! Rust closures: `connectedCallback` starts an activation task,
//! `disconnectedCallback` cancels it.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;

use wasm_bindgen::prelude::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CustomElementRegistry, Element};
use zoon::Task;

use super::element::BrowserElement;
use crate::condition::ConditionRegistry;
use crate::config::IslandConfig;
use crate::error::IslandError;
use crate::host::IslandElement;
use crate::island::{Island, IslandState};

const ELEMENT_CLASS_FACTORY: &str = "return class extends HTMLElement { \
    connectedCallback() { connected(this); } \
    disconnectedCallback() { disconnected(this); } \
};";

/// Per-tag lifecycle state shared by the connected and disconnected callbacks.
struct Lifecycle {
    registry: ConditionRegistry<BrowserElement>,
    live: RefCell<Vec<Island<BrowserElement>>>,
    /// Elements whose island already revealed. Weak, so removed nodes are collected.
    revealed: js_sys::WeakSet,
}

/// Keeps lifecycle closures alive for the lifetime of the page.
struct Registration {
    tag_name: String,
    _connected: Closure<dyn FnMut(Element)>,
    _disconnected: Closure<dyn FnMut(Element)>,
}

thread_local! {
    static REGISTRATIONS: RefCell<Vec<Registration>> = const { RefCell::new(Vec::new()) };
}

static LOGGER: Once = Once::new();

/// Register `<mini-island>` with the default config and every provider the
/// window supports. Routes `log` warnings and errors to the browser console.
pub fn register() -> Result<(), IslandError> {
    register_with(IslandConfig::default())
}

pub fn register_with(config: IslandConfig) -> Result<(), IslandError> {
    LOGGER.call_once(|| wasm_logger::init(wasm_logger::Config::new(log::Level::Warn)));
    register_registry(ConditionRegistry::with_defaults(config, super::browser_capabilities()))
}

/// Register the configured tag with a prepared registry, e.g. one with
/// extra condition kinds.
pub fn register_registry(registry: ConditionRegistry<BrowserElement>) -> Result<(), IslandError> {
    let Some(custom_elements) = custom_element_registry() else {
        zoon::eprintln!("Island cannot be initiated because Window.customElements is unavailable");
        return Err(IslandError::CapabilityUnavailable("customElements"));
    };
    let tag_name = registry.config().tag_name.clone();
    let already_defined = REGISTRATIONS.with(|registrations| {
        registrations
            .borrow()
            .iter()
            .any(|registration| registration.tag_name == tag_name)
    });
    if already_defined || !custom_elements.get(&tag_name).is_undefined() {
        let message = format!("<{tag_name}> is already defined");
        zoon::eprintln!("Island cannot be registered: {message}");
        return Err(IslandError::Registration(message));
    }

    let lifecycle = Rc::new(Lifecycle {
        registry,
        live: RefCell::default(),
        revealed: js_sys::WeakSet::new(),
    });

    let connected = Closure::wrap(Box::new({
        let lifecycle = lifecycle.clone();
        move |element: Element| connect(&lifecycle, BrowserElement(element))
    }) as Box<dyn FnMut(Element)>);
    let disconnected = Closure::wrap(Box::new(move |element: Element| {
        disconnect(&lifecycle, &BrowserElement(element))
    }) as Box<dyn FnMut(Element)>);

    let class = element_class(&connected, &disconnected)?;
    custom_elements.define(&tag_name, &class).map_err(|error| {
        let message = format!("{error:?}");
        zoon::eprintln!("Island cannot be registered: {message}");
        IslandError::Registration(message)
    })?;

    log::debug!("registered <{tag_name}>");
    REGISTRATIONS.with(|registrations| {
        registrations.borrow_mut().push(Registration {
            tag_name,
            _connected: connected,
            _disconnected: disconnected,
        })
    });
    Ok(())
}

fn custom_element_registry() -> Option<CustomElementRegistry> {
    let window = web_sys::window()?;
    let registry = js_sys::Reflect::get(&window, &JsValue::from_str("customElements")).ok()?;
    if registry.is_undefined() || registry.is_null() {
        return None;
    }
    Some(registry.unchecked_into())
}

fn element_class(
    connected: &Closure<dyn FnMut(Element)>,
    disconnected: &Closure<dyn FnMut(Element)>,
) -> Result<js_sys::Function, IslandError> {
    let factory = js_sys::Function::new_with_args("connected, disconnected", ELEMENT_CLASS_FACTORY);
    let class = factory
        .call2(&JsValue::NULL, connected.as_ref(), disconnected.as_ref())
        .map_err(|error| IslandError::Registration(format!("{error:?}")))?;
    Ok(class.unchecked_into())
}

fn connect(lifecycle: &Rc<Lifecycle>, element: BrowserElement) {
    if lifecycle.live.borrow().iter().any(|island| island.element().is_same(&element)) {
        return;
    }
    let island = Island::new(element);
    // A revealed element moved around the page. Children of a freshly parsed
    // element may not exist yet, so only elements seen before are skipped.
    if lifecycle.revealed.has(island.element().0.unchecked_ref())
        && !island.needs_reveal(lifecycle.registry.config())
    {
        log::debug!("<{}> already revealed", lifecycle.registry.config().tag_name);
        return;
    }
    lifecycle.live.borrow_mut().push(island.clone());

    let lifecycle = lifecycle.clone();
    Task::start(async move {
        match island.activate(&lifecycle.registry).await {
            Ok(activation) => log::debug!("island activation finished: {activation:?}"),
            Err(error) => log::error!("{error}"),
        }
        if island.state() == IslandState::Revealed {
            lifecycle.revealed.add(island.element().0.unchecked_ref());
        }
        lifecycle.live.borrow_mut().retain(|live| !live.ptr_eq(&island));
    });
}

fn disconnect(lifecycle: &Lifecycle, element: &BrowserElement) {
    let island = {
        let mut live = lifecycle.live.borrow_mut();
        let Some(index) = live.iter().position(|island| island.element().is_same(element)) else {
            return;
        };
        live.remove(index)
    };
    island.disconnect();
}
