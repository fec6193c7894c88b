//! In-memory host platform.
//!
//! A minimal element tree plus providers whose reports are driven by hand.
//! Nothing happens until the owner calls `set_matches`, `report` or
//! `run_idle`, which makes condition interleavings reproducible.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use crate::error::IslandError;
use crate::host::{Capabilities, ChangeListener, IdleScheduler, IslandElement, MediaMatcher, VisibilityObserver};
use crate::signal::Subscription;

// --- MemoryElement ---

/// Element or text node in an in-memory tree.
///
/// Children of a `template` element added with [`MemoryElement::with_content`]
/// live in its inert content, not in the tree.
#[derive(Clone)]
pub struct MemoryElement {
    node: Rc<RefCell<NodeData>>,
}

struct NodeData {
    kind: NodeKind,
    attributes: Vec<(String, String)>,
    children: Vec<MemoryElement>,
    content: Vec<MemoryElement>,
    parent: Weak<RefCell<NodeData>>,
}

enum NodeKind {
    Element(String),
    Text(String),
}

impl MemoryElement {
    fn from_kind(kind: NodeKind) -> Self {
        Self {
            node: Rc::new(RefCell::new(NodeData {
                kind,
                attributes: Vec::new(),
                children: Vec::new(),
                content: Vec::new(),
                parent: Weak::new(),
            })),
        }
    }

    pub fn new(tag: &str) -> Self {
        Self::from_kind(NodeKind::Element(tag.to_ascii_lowercase()))
    }

    pub fn text(text: &str) -> Self {
        Self::from_kind(NodeKind::Text(text.to_string()))
    }

    /// `<template>` carrying the given marker attribute.
    pub fn template(marker_attribute: &str) -> Self {
        Self::new("template").with_attribute(marker_attribute, "")
    }

    pub fn with_attribute(self, name: &str, value: &str) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_child(self, child: &MemoryElement) -> Self {
        self.append_child(child);
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        self.append_child(&MemoryElement::text(text));
        self
    }

    /// Append `child` to this template's inert content.
    pub fn with_content(self, child: &MemoryElement) -> Self {
        child.detach();
        self.node.borrow_mut().content.push(child.clone());
        self
    }

    pub fn tag(&self) -> Option<String> {
        match &self.node.borrow().kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        let mut node = self.node.borrow_mut();
        match node.attributes.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => node.attributes.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        self.node.borrow_mut().attributes.retain(|(existing, _)| existing != name);
    }

    /// Move `child` (from wherever it is) to the end of this element.
    pub fn append_child(&self, child: &MemoryElement) {
        child.detach();
        child.node.borrow_mut().parent = Rc::downgrade(&self.node);
        self.node.borrow_mut().children.push(child.clone());
    }

    /// Remove this node from its parent, if any.
    pub fn detach(&self) {
        let Some(parent) = self.parent() else {
            return;
        };
        parent
            .node
            .borrow_mut()
            .children
            .retain(|child| !Rc::ptr_eq(&child.node, &self.node));
        self.node.borrow_mut().parent = Weak::new();
    }

    pub fn parent(&self) -> Option<MemoryElement> {
        let node = self.node.borrow().parent.upgrade()?;
        Some(MemoryElement { node })
    }

    pub fn children(&self) -> Vec<MemoryElement> {
        self.node.borrow().children.clone()
    }

    pub fn content(&self) -> Vec<MemoryElement> {
        self.node.borrow().content.clone()
    }

    /// Live descendants with `tag`, in document order.
    pub fn descendants(&self, tag: &str) -> Vec<MemoryElement> {
        let mut found = Vec::new();
        self.collect_descendants(&mut |element: &MemoryElement| element.has_tag(tag), &mut found);
        found
    }

    fn collect_descendants(&self, matches: &mut dyn FnMut(&MemoryElement) -> bool, found: &mut Vec<MemoryElement>) {
        for child in self.children() {
            if matches(&child) {
                found.push(child.clone());
            }
            child.collect_descendants(matches, found);
        }
    }

    fn has_tag(&self, tag: &str) -> bool {
        matches!(&self.node.borrow().kind, NodeKind::Element(own) if own.eq_ignore_ascii_case(tag))
    }

    pub fn outer_html(&self) -> String {
        let mut html = String::new();
        self.write_html(&mut html);
        html
    }

    pub fn inner_html(&self) -> String {
        let mut html = String::new();
        for child in self.children() {
            child.write_html(&mut html);
        }
        html
    }

    fn write_html(&self, html: &mut String) {
        let node = self.node.borrow();
        match &node.kind {
            NodeKind::Text(text) => html.push_str(text),
            NodeKind::Element(tag) => {
                html.push('<');
                html.push_str(tag);
                for (name, value) in &node.attributes {
                    html.push(' ');
                    html.push_str(name);
                    if !value.is_empty() {
                        html.push_str(&format!("=\"{value}\""));
                    }
                }
                html.push('>');
                for child in node.content.iter().chain(&node.children) {
                    child.write_html(html);
                }
                html.push_str(&format!("</{tag}>"));
            }
        }
    }
}

impl IslandElement for MemoryElement {
    fn attribute(&self, name: &str) -> Option<String> {
        self.node
            .borrow()
            .attributes
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.clone())
    }

    fn descendants_matching(&self, tag: &str, attribute: &str) -> Vec<Self> {
        let mut found = Vec::new();
        self.collect_descendants(
            &mut |element: &MemoryElement| element.has_tag(tag) && element.attribute(attribute).is_some(),
            &mut found,
        );
        found
    }

    fn closest_ancestor(&self, tag: &str) -> Option<Self> {
        let mut current = self.parent();
        while let Some(element) = current {
            if element.has_tag(tag) {
                return Some(element);
            }
            current = element.parent();
        }
        None
    }

    fn is_same(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }

    fn replace_with_content(&self) -> Result<(), IslandError> {
        let parent = self
            .parent()
            .ok_or_else(|| IslandError::Reveal("inert block is not attached".to_string()))?;
        let index = parent
            .node
            .borrow()
            .children
            .iter()
            .position(|child| Rc::ptr_eq(&child.node, &self.node))
            .ok_or_else(|| IslandError::Reveal("inert block missing from its parent".to_string()))?;
        let content = std::mem::take(&mut self.node.borrow_mut().content);
        for node in &content {
            node.node.borrow_mut().parent = Rc::downgrade(&parent.node);
        }
        let mut parent_node = parent.node.borrow_mut();
        parent_node.children.splice(index..=index, content);
        drop(parent_node);
        self.node.borrow_mut().parent = Weak::new();
        Ok(())
    }
}

impl std::fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.outer_html())
    }
}

// --- MemoryMediaMatcher ---

/// Media queries whose match state is set by hand. Unknown queries don't match.
#[derive(Clone, Default)]
pub struct MemoryMediaMatcher {
    queries: Rc<RefCell<HashMap<String, MediaEntry>>>,
    next_id: Rc<Cell<u64>>,
}

#[derive(Default)]
struct MediaEntry {
    matches: bool,
    listeners: Vec<(u64, ChangeListener)>,
}

impl MemoryMediaMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the match state, notifying listeners if it flipped.
    pub fn set_matches(&self, query: &str, matches: bool) {
        let changed = {
            let mut queries = self.queries.borrow_mut();
            let entry = queries.entry(query.to_string()).or_default();
            let changed = entry.matches != matches;
            entry.matches = matches;
            changed
        };
        if changed {
            self.emit(query, matches);
        }
    }

    /// Deliver a change report without touching the stored state.
    /// Returns how many listeners were notified.
    pub fn emit(&self, query: &str, matches: bool) -> usize {
        let listeners = match self.queries.borrow_mut().get_mut(query) {
            Some(entry) => std::mem::take(&mut entry.listeners),
            None => return 0,
        };
        let notified = listeners.len();
        let kept: Vec<_> = listeners
            .into_iter()
            .filter_map(|(id, mut listener)| match listener(matches) {
                ControlFlow::Continue(()) => Some((id, listener)),
                ControlFlow::Break(()) => None,
            })
            .collect();
        let mut queries = self.queries.borrow_mut();
        let entry = queries.entry(query.to_string()).or_default();
        entry.listeners.splice(0..0, kept);
        notified
    }

    pub fn listener_count(&self, query: &str) -> usize {
        self.queries
            .borrow()
            .get(query)
            .map_or(0, |entry| entry.listeners.len())
    }
}

impl MediaMatcher for MemoryMediaMatcher {
    fn matches(&self, query: &str) -> Result<bool, IslandError> {
        Ok(self.queries.borrow().get(query).is_some_and(|entry| entry.matches))
    }

    fn watch(&self, query: &str, listener: ChangeListener) -> Result<Subscription, IslandError> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.queries
            .borrow_mut()
            .entry(query.to_string())
            .or_default()
            .listeners
            .push((id, listener));

        let queries = Rc::downgrade(&self.queries);
        let query = query.to_string();
        Ok(Subscription::new(move || {
            let Some(queries) = queries.upgrade() else {
                return;
            };
            if let Some(entry) = queries.borrow_mut().get_mut(&query) {
                entry.listeners.retain(|(existing, _)| *existing != id);
            }
        }))
    }
}

// --- MemoryVisibilityObserver ---

/// Intersection reports delivered by hand with [`MemoryVisibilityObserver::report`].
#[derive(Clone, Default)]
pub struct MemoryVisibilityObserver {
    observations: Rc<RefCell<Vec<Observation>>>,
    next_id: Rc<Cell<u64>>,
}

struct Observation {
    id: u64,
    target: MemoryElement,
    listener: ChangeListener,
}

impl MemoryVisibilityObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `target`'s intersection state. Returns how many observations
    /// were notified.
    pub fn report(&self, target: &MemoryElement, intersecting: bool) -> usize {
        let observations = std::mem::take(&mut *self.observations.borrow_mut());
        let (hits, mut kept): (Vec<_>, Vec<_>) = observations
            .into_iter()
            .partition(|observation| observation.target.is_same(target));
        let notified = hits.len();
        for mut observation in hits {
            if let ControlFlow::Continue(()) = (observation.listener)(intersecting) {
                kept.push(observation);
            }
        }
        self.observations.borrow_mut().splice(0..0, kept);
        notified
    }

    pub fn is_observing(&self, target: &MemoryElement) -> bool {
        self.observations
            .borrow()
            .iter()
            .any(|observation| observation.target.is_same(target))
    }

    pub fn observation_count(&self) -> usize {
        self.observations.borrow().len()
    }
}

impl VisibilityObserver<MemoryElement> for MemoryVisibilityObserver {
    fn observe(&self, target: &MemoryElement, listener: ChangeListener) -> Result<Subscription, IslandError> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.observations.borrow_mut().push(Observation {
            id,
            target: target.clone(),
            listener,
        });

        let observations = Rc::downgrade(&self.observations);
        Ok(Subscription::new(move || {
            if let Some(observations) = observations.upgrade() {
                observations.borrow_mut().retain(|observation| observation.id != id);
            }
        }))
    }
}

// --- MemoryIdleScheduler ---

/// Idle callbacks queued until [`MemoryIdleScheduler::run_idle`].
#[derive(Clone, Default)]
pub struct MemoryIdleScheduler {
    queue: Rc<RefCell<Vec<(u64, Box<dyn FnOnce()>)>>>,
    next_id: Rc<Cell<u64>>,
}

impl MemoryIdleScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run every queued callback. Returns how many ran.
    pub fn run_idle(&self) -> usize {
        let callbacks = std::mem::take(&mut *self.queue.borrow_mut());
        let ran = callbacks.len();
        for (_, callback) in callbacks {
            callback();
        }
        ran
    }
}

impl IdleScheduler for MemoryIdleScheduler {
    fn schedule(&self, callback: Box<dyn FnOnce()>) -> Result<Subscription, IslandError> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.queue.borrow_mut().push((id, callback));

        let queue = Rc::downgrade(&self.queue);
        Ok(Subscription::new(move || {
            if let Some(queue) = queue.upgrade() {
                queue.borrow_mut().retain(|(existing, _)| *existing != id);
            }
        }))
    }
}

// --- MemoryPlatform ---

/// All three in-memory providers, sharing state with the capabilities they
/// hand out.
#[derive(Clone, Default)]
pub struct MemoryPlatform {
    pub media: MemoryMediaMatcher,
    pub visibility: MemoryVisibilityObserver,
    pub idle: MemoryIdleScheduler,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capabilities(&self) -> Capabilities<MemoryElement> {
        Capabilities::none()
            .with_media(Rc::new(self.media.clone()))
            .with_visibility(Rc::new(self.visibility.clone()))
            .with_idle(Rc::new(self.idle.clone()))
    }
}
