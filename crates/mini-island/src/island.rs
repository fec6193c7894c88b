//! Island lifecycle: wait for every declared condition, then reveal once.
//!
//! ```text
//! Unactivated ──activate──▶ Waiting ──all signals──▶ Revealed
//!                              │
//!                              └──disconnect──▶ Detached
//! ```

use std::cell::{Cell, RefCell};
use std::pin::pin;
use std::rc::Rc;

use futures_channel::oneshot;
use futures_util::future::{self, Either};

use crate::condition::ConditionRegistry;
use crate::config::IslandConfig;
use crate::error::IslandError;
use crate::host::IslandElement;
use crate::signal::{ConditionSignal, PendingSignal};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IslandState {
    Unactivated,
    /// Conditions evaluated, barrier pending. The tree is untouched.
    Waiting,
    Revealed,
    /// Disconnected while waiting; will never reveal.
    Detached,
}

/// Outcome of one [`Island::activate`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Revealed { blocks: usize },
    /// The island had already been activated; nothing was done.
    Ignored(IslandState),
    /// The island was disconnected before its conditions were met.
    Detached,
}

/// One hydratable subtree.
///
/// Cloning is cheap and clones share state, so the host can keep a handle
/// for [`Island::disconnect`] while the activation future runs elsewhere.
pub struct Island<E> {
    inner: Rc<IslandInner<E>>,
}

struct IslandInner<E> {
    element: E,
    state: Cell<IslandState>,
    cancel: RefCell<Option<oneshot::Sender<()>>>,
}

impl<E: IslandElement> Island<E> {
    pub fn new(element: E) -> Self {
        Self {
            inner: Rc::new(IslandInner {
                element,
                state: Cell::new(IslandState::Unactivated),
                cancel: RefCell::new(None),
            }),
        }
    }

    pub fn element(&self) -> &E {
        &self.inner.element
    }

    pub fn state(&self) -> IslandState {
        self.inner.state.get()
    }

    /// Wait until every declared condition is satisfied, then reveal.
    ///
    /// Only the first call does anything; later calls return
    /// [`Activation::Ignored`] immediately.
    pub async fn activate(&self, registry: &ConditionRegistry<E>) -> Result<Activation, IslandError> {
        let state = self.state();
        if state != IslandState::Unactivated {
            log::debug!("island already activated ({state:?}), ignoring");
            return Ok(Activation::Ignored(state));
        }
        self.inner.state.set(IslandState::Waiting);

        let (cancel_sender, cancel_receiver) = oneshot::channel();
        *self.inner.cancel.borrow_mut() = Some(cancel_sender);

        let signals = self.start_conditions(registry);
        log::debug!("island waiting for {} condition(s)", signals.len());

        let barrier = pin!(future::join_all(signals));
        if let Either::Right(_) = future::select(barrier, cancel_receiver).await {
            return Ok(Activation::Detached);
        }
        self.inner.cancel.borrow_mut().take();
        if self.state() != IslandState::Waiting {
            return Ok(Activation::Detached);
        }

        self.inner.state.set(IslandState::Revealed);
        let blocks = self.reveal(registry.config())?;
        log::debug!("island revealed {blocks} block(s)");
        Ok(Activation::Revealed { blocks })
    }

    /// Cancel the island. A waiting activation stops and drops its pending
    /// signals, releasing their provider registrations; an activation that
    /// has not started yet will find the island detached and do nothing.
    ///
    /// Has no effect once the island is revealed.
    pub fn disconnect(&self) {
        match self.state() {
            IslandState::Unactivated => {
                self.inner.state.set(IslandState::Detached);
                log::debug!("island disconnected before activation");
            }
            IslandState::Waiting => {
                self.inner.state.set(IslandState::Detached);
                if let Some(cancel) = self.inner.cancel.borrow_mut().take() {
                    // Receiver gone means the activation future was already dropped.
                    let _ = cancel.send(());
                }
                log::debug!("island disconnected while waiting");
            }
            IslandState::Revealed | IslandState::Detached => {}
        }
    }

    /// Whether any inert block of this island is still waiting to be revealed.
    pub fn needs_reveal(&self, config: &IslandConfig) -> bool {
        !self.inert_blocks(config).is_empty()
    }

    /// Inert blocks owned by this island, in document order. Blocks inside
    /// nested islands belong to those islands.
    pub fn inert_blocks(&self, config: &IslandConfig) -> Vec<E> {
        let element = &self.inner.element;
        element
            .descendants_matching(&config.template_tag, &config.marker_attribute)
            .into_iter()
            .filter(|block| {
                block
                    .closest_ancestor(&config.tag_name)
                    .is_some_and(|owner| owner.is_same(element))
            })
            .collect()
    }

    fn start_conditions(&self, registry: &ConditionRegistry<E>) -> Vec<PendingSignal> {
        let element = &self.inner.element;
        registry
            .declared_conditions(element)
            .iter()
            .filter_map(|(name, argument)| registry.evaluate(name, argument, element))
            .filter_map(ConditionSignal::into_pending)
            .collect()
    }

    /// Replace every block, even past a failing one. Returns the number of
    /// blocks replaced, or the first failure.
    fn reveal(&self, config: &IslandConfig) -> Result<usize, IslandError> {
        let mut revealed = 0;
        let mut first_error = None;
        for block in self.inert_blocks(config) {
            match block.replace_with_content() {
                Ok(()) => revealed += 1,
                Err(error) => {
                    log::error!("{error}");
                    first_error.get_or_insert(error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(revealed),
        }
    }
}

impl<E> Island<E> {
    /// Whether both handles refer to the same island.
    pub fn ptr_eq(&self, other: &Island<E>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<E> Clone for Island<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E> std::fmt::Debug for Island<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Island")
            .field("state", &self.inner.state.get())
            .finish()
    }
}
