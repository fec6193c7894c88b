//! One-shot condition signals.
//!
//! A condition evaluates to a [`ConditionSignal`]: either already satisfied,
//! or a [`PendingSignal`] future paired with the [`SignalResolver`] that the
//! provider callback holds. The resolver can fire at most once; later calls
//! are no-ops that report `false`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_channel::oneshot;
use pin_project::pin_project;

/// Releases a provider registration (listener, observation, idle callback)
/// when dropped.
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription with nothing to release.
    pub fn empty() -> Self {
        Self { release: None }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Write side of a pending signal.
#[derive(Debug)]
pub struct SignalResolver {
    condition: String,
    sender: Option<oneshot::Sender<()>>,
}

impl SignalResolver {
    /// Resolve the signal. Returns `true` only for the call that actually
    /// resolved it.
    pub fn resolve(&mut self) -> bool {
        match self.sender.take() {
            Some(sender) => {
                // The island may already be gone; the signal still counts as resolved.
                let _ = sender.send(());
                true
            }
            None => {
                log::debug!("condition '{}' already resolved, ignoring", self.condition);
                false
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.sender.is_none()
    }
}

/// Read side of a pending signal. Completes once, when the resolver fires.
///
/// The provider registration attached with [`PendingSignal::attach`] lives as
/// long as the signal is pending and is released on completion or drop.
#[pin_project]
#[derive(Debug)]
pub struct PendingSignal {
    condition: String,
    #[pin]
    receiver: oneshot::Receiver<()>,
    subscription: Option<Subscription>,
}

impl PendingSignal {
    pub fn condition(&self) -> &str {
        &self.condition
    }

    /// Keep `subscription` alive until the signal completes or is dropped.
    pub fn attach(&mut self, subscription: Subscription) {
        self.subscription = Some(subscription);
    }
}

impl Future for PendingSignal {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.project();
        match this.receiver.poll(cx) {
            Poll::Ready(result) => {
                if result.is_err() {
                    // Provider dropped its callback without firing; waiting longer
                    // would leave the island stuck.
                    log::warn!(
                        "provider for condition '{}' went away before resolving, treating it as satisfied",
                        this.condition
                    );
                }
                this.subscription.take();
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Create a connected resolver/signal pair for `condition`.
pub fn pending(condition: impl Into<String>) -> (SignalResolver, PendingSignal) {
    let condition = condition.into();
    let (sender, receiver) = oneshot::channel();
    (
        SignalResolver {
            condition: condition.clone(),
            sender: Some(sender),
        },
        PendingSignal {
            condition,
            receiver,
            subscription: None,
        },
    )
}

/// Result of evaluating one condition declaration.
#[derive(Debug)]
pub enum ConditionSignal {
    /// Nothing to wait for.
    Satisfied,
    Pending(PendingSignal),
}

impl ConditionSignal {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, ConditionSignal::Satisfied)
    }

    pub fn into_pending(self) -> Option<PendingSignal> {
        match self {
            ConditionSignal::Satisfied => None,
            ConditionSignal::Pending(signal) => Some(signal),
        }
    }
}
