//! Capabilities the core consumes from its host.
//!
//! The core never touches a DOM directly. Platforms implement these traits:
//! [`crate::platform::browser`] on top of web-sys, [`crate::platform::memory`]
//! on an in-memory tree.

use std::ops::ControlFlow;
use std::rc::Rc;

use crate::error::IslandError;
use crate::signal::Subscription;

/// Listener for boolean provider reports (media match, intersection).
///
/// Returning `Break` asks the provider to drop the listener; it must not be
/// called again afterwards.
pub type ChangeListener = Box<dyn FnMut(bool) -> ControlFlow<()>>;

/// An element as seen by an island: attribute reads and the reveal mutation.
pub trait IslandElement: Clone + 'static {
    /// Attribute value, `Some("")` for a present attribute without value.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Live descendants with the given tag that carry `attribute`, in
    /// document order. Content held inside inert blocks is not live and is
    /// not returned.
    fn descendants_matching(&self, tag: &str, attribute: &str) -> Vec<Self>;

    /// Nearest proper ancestor with the given tag.
    fn closest_ancestor(&self, tag: &str) -> Option<Self>;

    fn is_same(&self, other: &Self) -> bool;

    /// Replace this inert block with its content, in place.
    fn replace_with_content(&self) -> Result<(), IslandError>;
}

pub trait MediaMatcher {
    /// Whether `query` matches right now.
    fn matches(&self, query: &str) -> Result<bool, IslandError>;

    /// Report every later change of `query` to `listener` until it breaks or
    /// the subscription is dropped.
    fn watch(&self, query: &str, listener: ChangeListener) -> Result<Subscription, IslandError>;
}

pub trait VisibilityObserver<E> {
    /// Report intersection changes of `target` with the viewport to
    /// `listener` until it breaks or the subscription is dropped.
    fn observe(&self, target: &E, listener: ChangeListener) -> Result<Subscription, IslandError>;
}

pub trait IdleScheduler {
    /// Run `callback` once the host is idle. Dropping the subscription
    /// before that cancels the callback.
    fn schedule(&self, callback: Box<dyn FnOnce()>) -> Result<Subscription, IslandError>;
}

/// Optional providers handed to the built-in conditions.
///
/// A missing provider degrades its condition to "already satisfied".
pub struct Capabilities<E> {
    pub media: Option<Rc<dyn MediaMatcher>>,
    pub visibility: Option<Rc<dyn VisibilityObserver<E>>>,
    pub idle: Option<Rc<dyn IdleScheduler>>,
}

impl<E> Capabilities<E> {
    /// No providers at all: every built-in condition is satisfied immediately.
    pub fn none() -> Self {
        Self {
            media: None,
            visibility: None,
            idle: None,
        }
    }

    pub fn with_media(mut self, media: Rc<dyn MediaMatcher>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_visibility(mut self, visibility: Rc<dyn VisibilityObserver<E>>) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_idle(mut self, idle: Rc<dyn IdleScheduler>) -> Self {
        self.idle = Some(idle);
        self
    }
}

impl<E> Default for Capabilities<E> {
    fn default() -> Self {
        Self::none()
    }
}

impl<E> Clone for Capabilities<E> {
    fn clone(&self) -> Self {
        Self {
            media: self.media.clone(),
            visibility: self.visibility.clone(),
            idle: self.idle.clone(),
        }
    }
}

impl<E> std::fmt::Debug for Capabilities<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("media", &self.media.is_some())
            .field("visibility", &self.visibility.is_some())
            .field("idle", &self.idle.is_some())
            .finish()
    }
}
