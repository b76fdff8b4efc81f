use fragkit_types::{EntityKind, Lid, StableIdentifier};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Lifecycle of a live instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Live,
    Destroying,
    Destroyed,
}

struct RecordInner {
    identity: RefCell<StableIdentifier>,
    kind: EntityKind,
    state: Cell<LifecycleState>,
}

/// Handle to a live record or fragment instance.
///
/// Clones share one instance; equality is instance identity. A fragment's
/// identity can be rebound when it moves to another slot.
#[derive(Clone)]
pub struct Record(Rc<RecordInner>);

impl Record {
    pub(crate) fn new(identity: StableIdentifier, kind: EntityKind) -> Self {
        Self(Rc::new(RecordInner {
            identity: RefCell::new(identity),
            kind,
            state: Cell::new(LifecycleState::Live),
        }))
    }

    pub fn identity(&self) -> StableIdentifier {
        self.0.identity.borrow().clone()
    }

    pub fn lid(&self) -> Lid {
        self.0.identity.borrow().lid().clone()
    }

    pub fn entity_type(&self) -> String {
        self.0.identity.borrow().entity_type().to_string()
    }

    pub fn id(&self) -> Option<String> {
        self.0.identity.borrow().id()
    }

    pub fn kind(&self) -> EntityKind {
        self.0.kind
    }

    pub fn state(&self) -> LifecycleState {
        self.0.state.get()
    }

    pub fn is_live(&self) -> bool {
        self.state() == LifecycleState::Live
    }

    pub fn is_destroying(&self) -> bool {
        self.state() == LifecycleState::Destroying
    }

    pub fn is_destroyed(&self) -> bool {
        self.state() == LifecycleState::Destroyed
    }

    pub(crate) fn set_state(&self, state: LifecycleState) {
        self.0.state.set(state);
    }

    pub(crate) fn rebind(&self, identity: StableIdentifier) {
        *self.0.identity.borrow_mut() = identity;
    }

    /// True if both handles are the same instance.
    pub fn same(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Record {}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("identity", &*self.0.identity.borrow())
            .field("kind", &self.0.kind)
            .field("state", &self.0.state.get())
            .finish()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0.identity.borrow(), f)
    }
}
