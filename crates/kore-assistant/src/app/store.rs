//! In-memory index of discovered declarations.

use std::fmt;

use crate::domain::model::{DocumentId, Element, ElementKind};

/// Handle returned by [`ElementStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut()>;

/// Workspace-wide collection of declarations.
///
/// Every mutation notifies all observers synchronously before returning. All
/// read accessors hand out copies, so callers can never reach the internal
/// vector.
#[derive(Default)]
pub struct ElementStore {
    elements: Vec<Element>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl ElementStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback fired after every mutation.
    pub fn subscribe(&mut self, observer: impl FnMut() + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Drop a previously registered callback. Returns `false` for unknown handles.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// Append an element.
    pub fn add(&mut self, element: Element) {
        self.elements.push(element);
        self.notify();
    }

    /// Remove the first element sharing `element`'s (name, kind, document).
    ///
    /// Observers are only notified when something was removed.
    pub fn remove(&mut self, element: &Element) -> bool {
        let Some(index) = self
            .elements
            .iter()
            .position(|existing| existing.same_identity(element))
        else {
            return false;
        };
        self.elements.remove(index);
        self.notify();
        true
    }

    /// Evict every element attributed to `document`, returning how many went.
    ///
    /// Notifies exactly once, even when nothing matched.
    pub fn remove_matching(&mut self, document: &DocumentId) -> usize {
        let before = self.elements.len();
        self.elements.retain(|element| &element.document != document);
        let removed = before - self.elements.len();
        self.notify();
        removed
    }

    /// Empty the store.
    pub fn clear_all(&mut self) {
        self.elements.clear();
        self.notify();
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// All elements in insertion order.
    pub fn list(&self) -> Vec<Element> {
        self.elements.clone()
    }

    pub fn list_by_kind(&self, kind: ElementKind) -> Vec<Element> {
        self.filtered(|element| element.kind == kind)
    }

    pub fn list_by_document(&self, document: &DocumentId) -> Vec<Element> {
        self.filtered(|element| &element.document == document)
    }

    /// First element with exactly this name, in insertion order.
    pub fn find_by_name(&self, name: &str) -> Option<Element> {
        self.elements
            .iter()
            .find(|element| element.name == name)
            .cloned()
    }

    /// Distinct documents in the order they were first seen.
    pub fn documents(&self) -> Vec<DocumentId> {
        let mut documents: Vec<DocumentId> = Vec::new();
        for element in &self.elements {
            if !documents.contains(&element.document) {
                documents.push(element.document.clone());
            }
        }
        documents
    }

    fn filtered(&self, predicate: impl Fn(&Element) -> bool) -> Vec<Element> {
        self.elements
            .iter()
            .filter(|element| predicate(element))
            .cloned()
            .collect()
    }

    fn notify(&mut self) {
        for (_, observer) in self.observers.iter_mut() {
            observer();
        }
    }
}

impl fmt::Debug for ElementStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementStore")
            .field("elements", &self.elements)
            .field("observers", &self.observers.len())
            .finish()
    }
}
