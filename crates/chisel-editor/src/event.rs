//! Typed event bus for UI-facing side effects.
//!
//! Topics form a closed set: each is a marker type bound to exactly one
//! payload type and a stable wire name, so a mismatched publish or subscribe
//! is a compile error. The bus is a plain value handed to whoever needs it.
//!
//! A subscriber that unsubscribes (itself or another) during delivery is
//! never invoked again, not even by the publish already in progress.

use crate::controller::AsyncController;
use crate::document::DocumentId;
use chisel_core::NodeId;
use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

mod sealed {
    pub trait Sealed {}
}

pub trait Topic: sealed::Sealed + 'static {
    type Payload: 'static;
    const NAME: &'static str;
}

macro_rules! topics {
    ($($(#[$meta:meta])* $ty:ident($payload:ty) = $name:literal;)*) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy)]
            pub struct $ty;
            impl sealed::Sealed for $ty {}
            impl Topic for $ty {
                type Payload = $payload;
                const NAME: &'static str = $name;
            }
        )*
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorType {
    #[default]
    Default,
    Selection,
    Crosshair,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionChangedArgs {
    pub document: DocumentId,
    pub selected: Vec<NodeId>,
    pub unselected: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChangedArgs {
    pub document: DocumentId,
    pub node: NodeId,
    pub property: String,
}

topics! {
    /// Prompt text for the status bar.
    StatusBarTip(String) = "statusBarTip";
    ClearStatusBarTip(()) = "clearStatusBarTip";
    ViewCursor(CursorType) = "viewCursor";
    /// Transient user-visible notice.
    ShowToast(String) = "showToast";
    /// Show confirm/cancel buttons wired to the pending pick.
    ShowSelectionControl(AsyncController) = "showSelectionControl";
    ClearSelectionControl(()) = "clearSelectionControl";
    SelectionChanged(SelectionChangedArgs) = "selectionChanged";
    PropertyChanged(PropertyChangedArgs) = "propertyChanged";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Rc<dyn Fn(&dyn Any)>;

struct Subscriber {
    id: SubscriptionId,
    callback: Callback,
}

#[derive(Default)]
pub struct EventBus {
    topics: RefCell<HashMap<TypeId, Vec<Subscriber>>>,
    next_id: Cell<u64>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.topics.borrow().len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<T: Topic>(&self, f: impl Fn(&T::Payload) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let callback: Callback = Rc::new(move |payload: &dyn Any| {
            if let Some(p) = payload.downcast_ref::<T::Payload>() {
                f(p);
            }
        });
        self.topics
            .borrow_mut()
            .entry(TypeId::of::<T>())
            .or_default()
            .push(Subscriber { id, callback });
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut topics = self.topics.borrow_mut();
        for subs in topics.values_mut() {
            if let Some(pos) = subs.iter().position(|s| s.id == id) {
                subs.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.topics
            .borrow()
            .values()
            .any(|subs| subs.iter().any(|s| s.id == id))
    }

    pub fn subscriber_count<T: Topic>(&self) -> usize {
        self.topics
            .borrow()
            .get(&TypeId::of::<T>())
            .map_or(0, Vec::len)
    }

    pub fn publish<T: Topic>(&self, payload: T::Payload) {
        log::trace!("publish {}", T::NAME);
        // Deliver from a snapshot so callbacks may (un)subscribe freely.
        let snapshot: Vec<(SubscriptionId, Callback)> = self
            .topics
            .borrow()
            .get(&TypeId::of::<T>())
            .map(|subs| subs.iter().map(|s| (s.id, s.callback.clone())).collect())
            .unwrap_or_default();
        for (id, callback) in snapshot {
            if self.is_subscribed(id) {
                callback(&payload);
            }
        }
    }
}
