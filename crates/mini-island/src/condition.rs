//! Condition kinds, their evaluators and the registry that dispatches to them.
//!
//! The registry maps a condition name to a [`ConditionEvaluator`]. It is seeded
//! from [`ConditionKind`] and stays open: [`ConditionRegistry::register`] adds
//! new kinds without touching the island barrier.

use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::rc::Rc;

use crate::config::{IdleStrategy, IslandConfig};
use crate::error::IslandError;
use crate::host::{Capabilities, IdleScheduler, IslandElement, MediaMatcher, VisibilityObserver};
use crate::signal::{self, ConditionSignal};

/// Declared conditions of one element: condition name → attribute value.
pub type DeclaredConditions = BTreeMap<String, String>;

/// Built-in condition kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConditionKind {
    /// `client:media="<query>"`: wait until the media query matches.
    Media,
    /// `client:idle`: wait until the host is idle.
    Idle,
    /// `client:visible`: wait until the island intersects the viewport.
    Visible,
}

impl ConditionKind {
    pub const ALL: [ConditionKind; 3] = [Self::Media, Self::Idle, Self::Visible];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Media => "media",
            Self::Idle => "idle",
            Self::Visible => "visible",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// The built-in evaluator for this kind, wired to the host providers.
    pub fn evaluator<E: IslandElement>(
        &self,
        capabilities: &Capabilities<E>,
        config: &IslandConfig,
    ) -> Rc<dyn ConditionEvaluator<E>> {
        match self {
            Self::Media => Rc::new(MediaCondition {
                matcher: capabilities.media.clone(),
            }),
            Self::Idle => Rc::new(IdleCondition {
                scheduler: capabilities.idle.clone(),
                strategy: config.idle,
            }),
            Self::Visible => Rc::new(VisibleCondition {
                observer: capabilities.visibility.clone(),
            }),
        }
    }
}

impl std::fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Turns one condition declaration into a signal.
pub trait ConditionEvaluator<E> {
    fn evaluate(&self, argument: &str, element: &E) -> Result<ConditionSignal, IslandError>;
}

impl<E, F> ConditionEvaluator<E> for F
where
    F: Fn(&str, &E) -> Result<ConditionSignal, IslandError>,
{
    fn evaluate(&self, argument: &str, element: &E) -> Result<ConditionSignal, IslandError> {
        self(argument, element)
    }
}

/// Resolves the first time the query starts matching.
pub struct MediaCondition {
    matcher: Option<Rc<dyn MediaMatcher>>,
}

impl<E> ConditionEvaluator<E> for MediaCondition {
    fn evaluate(&self, query: &str, _element: &E) -> Result<ConditionSignal, IslandError> {
        let Some(matcher) = &self.matcher else {
            return Ok(ConditionSignal::Satisfied);
        };
        if query.is_empty() || matcher.matches(query)? {
            return Ok(ConditionSignal::Satisfied);
        }
        let (mut resolver, mut signal) = signal::pending(ConditionKind::Media.name());
        let subscription = matcher.watch(
            query,
            Box::new(move |matches| {
                if matches {
                    resolver.resolve();
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }),
        )?;
        signal.attach(subscription);
        Ok(ConditionSignal::Pending(signal))
    }
}

pub struct IdleCondition {
    scheduler: Option<Rc<dyn IdleScheduler>>,
    strategy: IdleStrategy,
}

impl<E> ConditionEvaluator<E> for IdleCondition {
    fn evaluate(&self, _argument: &str, _element: &E) -> Result<ConditionSignal, IslandError> {
        let scheduler = match (self.strategy, &self.scheduler) {
            (IdleStrategy::Scheduler, Some(scheduler)) => scheduler,
            _ => return Ok(ConditionSignal::Satisfied),
        };
        let (mut resolver, mut signal) = signal::pending(ConditionKind::Idle.name());
        let subscription = scheduler.schedule(Box::new(move || {
            resolver.resolve();
        }))?;
        signal.attach(subscription);
        Ok(ConditionSignal::Pending(signal))
    }
}

/// Resolves on the first intersecting report, then stops observing.
pub struct VisibleCondition<E> {
    observer: Option<Rc<dyn VisibilityObserver<E>>>,
}

impl<E> ConditionEvaluator<E> for VisibleCondition<E> {
    fn evaluate(&self, _argument: &str, element: &E) -> Result<ConditionSignal, IslandError> {
        let Some(observer) = &self.observer else {
            return Ok(ConditionSignal::Satisfied);
        };
        let (mut resolver, mut signal) = signal::pending(ConditionKind::Visible.name());
        let subscription = observer.observe(
            element,
            Box::new(move |intersecting| {
                if intersecting {
                    resolver.resolve();
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            }),
        )?;
        signal.attach(subscription);
        Ok(ConditionSignal::Pending(signal))
    }
}

/// Condition name → evaluator table, built once at startup and passed to
/// every [`crate::Island::activate`] call.
pub struct ConditionRegistry<E> {
    config: IslandConfig,
    evaluators: BTreeMap<String, Rc<dyn ConditionEvaluator<E>>>,
}

impl<E: IslandElement> ConditionRegistry<E> {
    /// Registry without any condition kinds.
    pub fn new(config: IslandConfig) -> Self {
        Self {
            config,
            evaluators: BTreeMap::new(),
        }
    }

    /// Registry with every [`ConditionKind`] wired to `capabilities`.
    pub fn with_defaults(config: IslandConfig, capabilities: Capabilities<E>) -> Self {
        let mut registry = Self::new(config);
        for kind in ConditionKind::ALL {
            let evaluator = kind.evaluator(&capabilities, &registry.config);
            registry.evaluators.insert(kind.name().to_string(), evaluator);
        }
        registry
    }

    /// Add or replace the evaluator for `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        evaluator: impl ConditionEvaluator<E> + 'static,
    ) -> &mut Self {
        self.evaluators.insert(name.into(), Rc::new(evaluator));
        self
    }

    pub fn config(&self) -> &IslandConfig {
        &self.config
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.evaluators.keys().map(String::as_str)
    }

    /// Every registered condition declared on `element`, with its argument.
    pub fn declared_conditions(&self, element: &E) -> DeclaredConditions {
        self.evaluators
            .keys()
            .filter_map(|name| {
                let argument = element.attribute(&self.config.condition_attribute(name))?;
                Some((name.clone(), argument))
            })
            .collect()
    }

    pub fn has_conditions(&self, element: &E) -> bool {
        !self.declared_conditions(element).is_empty()
    }

    /// Evaluate one declaration.
    ///
    /// Returns `None` for a name without evaluator. A failing evaluator
    /// yields a satisfied signal so the island cannot get stuck.
    pub fn evaluate(&self, name: &str, argument: &str, element: &E) -> Option<ConditionSignal> {
        let Some(evaluator) = self.evaluators.get(name) else {
            log::trace!("ignoring unknown condition '{name}'");
            return None;
        };
        match evaluator.evaluate(argument, element) {
            Ok(signal) => Some(signal),
            Err(error) => {
                log::warn!("{error}; treating condition '{name}' as satisfied");
                Some(ConditionSignal::Satisfied)
            }
        }
    }
}

impl<E> std::fmt::Debug for ConditionRegistry<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionRegistry")
            .field("config", &self.config)
            .field("conditions", &self.evaluators.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::task::{Context, Poll};

    use futures_util::FutureExt;
    use futures_util::task::noop_waker_ref;

    use super::*;
    use crate::platform::memory::{MemoryElement, MemoryIdleScheduler, MemoryMediaMatcher, MemoryVisibilityObserver};

    fn poll(signal: &mut signal::PendingSignal) -> Poll<()> {
        signal.poll_unpin(&mut Context::from_waker(noop_waker_ref()))
    }

    fn registry_with(capabilities: Capabilities<MemoryElement>) -> ConditionRegistry<MemoryElement> {
        ConditionRegistry::with_defaults(IslandConfig::default(), capabilities)
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in ConditionKind::ALL {
            assert_eq!(ConditionKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ConditionKind::from_name("hover"), None);
    }

    #[test]
    fn declared_conditions_only_lists_present_attributes() {
        let registry = registry_with(Capabilities::none());
        let island = MemoryElement::new("mini-island")
            .with_attribute("client:media", "(min-width: 600px)")
            .with_attribute("client:visible", "")
            .with_attribute("client:hover", "")
            .with_attribute("class", "hero");

        let declared = registry.declared_conditions(&island);
        assert_eq!(declared.len(), 2);
        assert_eq!(declared["media"], "(min-width: 600px)");
        assert_eq!(declared["visible"], "");
        assert!(registry.has_conditions(&island));
        assert!(!registry.has_conditions(&MemoryElement::new("mini-island")));
    }

    #[test]
    fn custom_prefix_is_respected() {
        let config = IslandConfig {
            condition_prefix: "on-".to_string(),
            ..IslandConfig::default()
        };
        let registry = ConditionRegistry::with_defaults(config, Capabilities::none());
        let island = MemoryElement::new("mini-island")
            .with_attribute("on-idle", "")
            .with_attribute("client:visible", "");

        let declared = registry.declared_conditions(&island);
        assert_eq!(declared.keys().collect::<Vec<_>>(), vec!["idle"]);
    }

    #[test]
    fn missing_providers_are_satisfied() {
        let registry = registry_with(Capabilities::none());
        let island = MemoryElement::new("mini-island");
        for kind in ConditionKind::ALL {
            let signal = registry.evaluate(kind.name(), "(min-width: 1px)", &island).unwrap();
            assert!(signal.is_satisfied(), "{kind} should be satisfied");
        }
    }

    #[test]
    fn unknown_condition_yields_no_signal() {
        let registry = registry_with(Capabilities::none());
        assert!(registry.evaluate("hover", "", &MemoryElement::new("mini-island")).is_none());
    }

    #[test]
    fn media_already_matching_is_satisfied() {
        let media = MemoryMediaMatcher::new();
        media.set_matches("(min-width: 600px)", true);
        let registry = registry_with(Capabilities::none().with_media(Rc::new(media.clone())));

        let signal = registry
            .evaluate("media", "(min-width: 600px)", &MemoryElement::new("mini-island"))
            .unwrap();
        assert!(signal.is_satisfied());
        assert_eq!(media.listener_count("(min-width: 600px)"), 0);
    }

    #[test]
    fn media_empty_query_is_satisfied() {
        let media = MemoryMediaMatcher::new();
        let registry = registry_with(Capabilities::none().with_media(Rc::new(media)));
        let signal = registry.evaluate("media", "", &MemoryElement::new("mini-island")).unwrap();
        assert!(signal.is_satisfied());
    }

    #[test]
    fn media_waits_for_transition_to_matching() {
        let media = MemoryMediaMatcher::new();
        let registry = registry_with(Capabilities::none().with_media(Rc::new(media.clone())));

        let mut signal = registry
            .evaluate("media", "(prefers-reduced-motion)", &MemoryElement::new("mini-island"))
            .unwrap()
            .into_pending()
            .unwrap();
        assert!(poll(&mut signal).is_pending());
        assert_eq!(media.listener_count("(prefers-reduced-motion)"), 1);

        media.set_matches("(prefers-reduced-motion)", true);
        assert!(poll(&mut signal).is_ready());
        assert_eq!(media.listener_count("(prefers-reduced-motion)"), 0);
    }

    #[test]
    fn media_ignores_non_matching_changes() {
        let media = MemoryMediaMatcher::new();
        let registry = registry_with(Capabilities::none().with_media(Rc::new(media.clone())));

        let mut signal = registry
            .evaluate("media", "print", &MemoryElement::new("mini-island"))
            .unwrap()
            .into_pending()
            .unwrap();
        media.emit("print", false);
        assert!(poll(&mut signal).is_pending());
        assert_eq!(media.listener_count("print"), 1);
    }

    #[test]
    fn dropping_media_signal_removes_listener() {
        let media = MemoryMediaMatcher::new();
        let registry = registry_with(Capabilities::none().with_media(Rc::new(media.clone())));
        let signal = registry
            .evaluate("media", "(orientation: portrait)", &MemoryElement::new("mini-island"))
            .unwrap();
        assert_eq!(media.listener_count("(orientation: portrait)"), 1);
        drop(signal);
        assert_eq!(media.listener_count("(orientation: portrait)"), 0);
    }

    #[test]
    fn visible_resolves_on_first_intersection_and_detaches() {
        let observer = MemoryVisibilityObserver::new();
        let registry = registry_with(Capabilities::none().with_visibility(Rc::new(observer.clone())));
        let island = MemoryElement::new("mini-island").with_attribute("client:visible", "");

        let mut signal = registry.evaluate("visible", "", &island).unwrap().into_pending().unwrap();
        assert!(observer.is_observing(&island));

        observer.report(&island, false);
        assert!(poll(&mut signal).is_pending());

        assert_eq!(observer.report(&island, true), 1);
        assert!(!observer.is_observing(&island));
        assert_eq!(observer.report(&island, true), 0);
        assert!(poll(&mut signal).is_ready());
    }

    #[test]
    fn idle_is_immediate_by_default() {
        let idle = MemoryIdleScheduler::new();
        let registry = registry_with(Capabilities::none().with_idle(Rc::new(idle.clone())));
        let signal = registry.evaluate("idle", "", &MemoryElement::new("mini-island")).unwrap();
        assert!(signal.is_satisfied());
        assert_eq!(idle.queued(), 0);
    }

    #[test]
    fn idle_scheduler_strategy_waits_for_idle_callback() {
        let idle = MemoryIdleScheduler::new();
        let config = IslandConfig {
            idle: IdleStrategy::Scheduler,
            ..IslandConfig::default()
        };
        let registry = ConditionRegistry::with_defaults(
            config,
            Capabilities::none().with_idle(Rc::new(idle.clone())),
        );
        let mut signal = registry
            .evaluate("idle", "", &MemoryElement::new("mini-island"))
            .unwrap()
            .into_pending()
            .unwrap();
        assert!(poll(&mut signal).is_pending());

        assert_eq!(idle.run_idle(), 1);
        assert!(poll(&mut signal).is_ready());
    }

    #[test]
    fn failing_evaluator_is_treated_as_satisfied() {
        let mut registry = registry_with(Capabilities::none());
        registry.register("network", |_: &str, _: &MemoryElement| -> Result<ConditionSignal, IslandError> {
            Err(IslandError::evaluator("network", "offline"))
        });
        let signal = registry.evaluate("network", "", &MemoryElement::new("mini-island")).unwrap();
        assert!(signal.is_satisfied());
    }

    #[test]
    fn registered_kind_is_declared() {
        let mut registry = registry_with(Capabilities::none());
        registry.register("interaction", |_: &str, _: &MemoryElement| -> Result<ConditionSignal, IslandError> {
            Ok(ConditionSignal::Satisfied)
        });
        let island = MemoryElement::new("mini-island").with_attribute("client:interaction", "click");
        assert_eq!(registry.declared_conditions(&island)["interaction"], "click");
        assert_eq!(registry.names().count(), 4);
    }
}
