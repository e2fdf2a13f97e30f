use std::fmt;

use crate::model::event::{ChangeKind, TreeChange, ViewEvent, ViewEventKind};

/// Token returned by `connect`, used to disconnect the callback again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// An event that can be routed by kind.
pub trait Signal {
    type Kind: Copy + Eq;
    fn kind(&self) -> Self::Kind;
}

impl Signal for TreeChange {
    type Kind = ChangeKind;
    fn kind(&self) -> ChangeKind {
        TreeChange::kind(self)
    }
}

impl Signal for ViewEvent {
    type Kind = ViewEventKind;
    fn kind(&self) -> ViewEventKind {
        ViewEvent::kind(self)
    }
}

type Callback<E> = Box<dyn FnMut(&E)>;

struct Slot<E: Signal> {
    id: ListenerId,
    /// `None` receives every kind
    kind: Option<E::Kind>,
    callback: Callback<E>,
}

/// Callback registry keyed by event kind.
///
/// Callbacks run synchronously, in registration order, and receive only the
/// event; they cannot reach back into the emitter.
pub struct Listeners<E: Signal> {
    next_id: u64,
    slots: Vec<Slot<E>>,
}

impl<E: Signal> Default for Listeners<E> {
    fn default() -> Self {
        Listeners {
            next_id: 0,
            slots: Vec::new(),
        }
    }
}

impl<E: Signal> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("connected", &self.slots.len())
            .finish()
    }
}

impl<E: Signal> Listeners<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for one kind of event
    pub fn connect(&mut self, kind: E::Kind, callback: impl FnMut(&E) + 'static) -> ListenerId {
        self.insert(Some(kind), Box::new(callback))
    }

    /// Register a callback for every event
    pub fn connect_all(&mut self, callback: impl FnMut(&E) + 'static) -> ListenerId {
        self.insert(None, Box::new(callback))
    }

    fn insert(&mut self, kind: Option<E::Kind>, callback: Callback<E>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.slots.push(Slot { id, kind, callback });
        id
    }

    /// Remove a callback. Returns false if the token is unknown.
    pub fn disconnect(&mut self, id: ListenerId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|s| s.id != id);
        self.slots.len() != before
    }

    pub fn emit(&mut self, event: &E) {
        let kind = event.kind();
        for slot in self.slots.iter_mut() {
            if slot.kind.is_none_or(|k| k == kind) {
                (slot.callback)(event);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
