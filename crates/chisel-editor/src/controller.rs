//! Cancellation controller for one interactive operation.
//!
//! A controller is a three-state token: `Pending`, then exactly one of
//! `Succeeded` or `Cancelled`. Terminal states are final; later `succeed` or
//! `cancel` calls are no-ops that return `false`. Callbacks fire synchronously
//! at the transition, and `dispose()` guarantees none fires afterwards.
//!
//! Waiting is `async`: the state is broadcast on a `watch` channel, so any
//! number of futures can await the same controller without polling.
//! Controllers form a tree through `child()`; cancelling a parent cancels
//! its pending children first, innermost last in, first out.

use crate::error::CancelReason;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerState {
    Pending,
    Succeeded,
    Cancelled(CancelReason),
}

/// Result of something the user may abandon.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Succeeded(T),
    Cancelled(CancelReason),
}

impl<T> Outcome<T> {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Outcome::Succeeded(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Succeeded(v) => Some(v),
            Outcome::Cancelled(_) => None,
        }
    }

    pub fn cancel_reason(&self) -> Option<&CancelReason> {
        match self {
            Outcome::Succeeded(_) => None,
            Outcome::Cancelled(r) => Some(r),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Succeeded(v) => Outcome::Succeeded(f(v)),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
        }
    }
}

type CompletedCallback = Box<dyn FnOnce()>;
type CancelledCallback = Box<dyn FnOnce(&CancelReason)>;

struct Inner {
    id: u64,
    state: watch::Sender<ControllerState>,
    completed: RefCell<Vec<CompletedCallback>>,
    cancelled: RefCell<Vec<CancelledCallback>>,
    disposed: Cell<bool>,
    parent: Option<Weak<Inner>>,
    children: RefCell<Vec<Weak<Inner>>>,
}

/// Shared handle; clones refer to the same controller.
#[derive(Clone)]
pub struct AsyncController {
    inner: Rc<Inner>,
}

impl PartialEq for AsyncController {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for AsyncController {}

impl fmt::Debug for AsyncController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncController")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

impl Default for AsyncController {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncController {
    pub fn new() -> Self {
        Self::with_parent(None)
    }

    fn with_parent(parent: Option<Weak<Inner>>) -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        let (state, _) = watch::channel(ControllerState::Pending);
        Self {
            inner: Rc::new(Inner {
                id: NEXT.fetch_add(1, Ordering::Relaxed),
                state,
                completed: RefCell::new(Vec::new()),
                cancelled: RefCell::new(Vec::new()),
                disposed: Cell::new(false),
                parent,
                children: RefCell::new(Vec::new()),
            }),
        }
    }

    /// A controller that is cancelled whenever this one is.
    ///
    /// A child of an already-cancelled controller starts out cancelled.
    pub fn child(&self) -> AsyncController {
        let child = Self::with_parent(Some(Rc::downgrade(&self.inner)));
        {
            let mut children = self.inner.children.borrow_mut();
            children.retain(|c| c.strong_count() > 0);
            children.push(Rc::downgrade(&child.inner));
        }
        if let ControllerState::Cancelled(reason) = self.state() {
            child.cancel(reason);
        }
        child
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn state(&self) -> ControllerState {
        self.inner.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.inner.state.borrow(), ControllerState::Pending)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// `true` if `ancestor` is this controller or one of its parents.
    pub fn is_descendant_of(&self, ancestor: &AsyncController) -> bool {
        let mut current = Some(self.inner.clone());
        while let Some(inner) = current {
            if Rc::ptr_eq(&inner, &ancestor.inner) {
                return true;
            }
            current = inner.parent.as_ref().and_then(Weak::upgrade);
        }
        false
    }

    fn transition(&self, to: ControllerState) -> bool {
        if self.inner.disposed.get() || !self.is_pending() {
            return false;
        }
        self.inner.state.send_replace(to);
        true
    }

    /// Resolve as succeeded. Returns `false` if already resolved or disposed.
    pub fn succeed(&self) -> bool {
        if !self.transition(ControllerState::Succeeded) {
            return false;
        }
        log::trace!("controller {} succeeded", self.inner.id);
        self.inner.cancelled.borrow_mut().clear();
        let callbacks = std::mem::take(&mut *self.inner.completed.borrow_mut());
        for callback in callbacks {
            if self.inner.disposed.get() {
                break;
            }
            callback();
        }
        true
    }

    /// Resolve as cancelled, children first. Returns `false` if already
    /// resolved or disposed.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        if !self.transition(ControllerState::Cancelled(reason.clone())) {
            return false;
        }
        log::trace!("controller {} cancelled: {reason:?}", self.inner.id);
        let children: Vec<_> = self
            .inner
            .children
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for inner in children.into_iter().rev() {
            AsyncController { inner }.cancel(reason.clone());
        }
        self.inner.completed.borrow_mut().clear();
        let callbacks = std::mem::take(&mut *self.inner.cancelled.borrow_mut());
        for callback in callbacks {
            if self.inner.disposed.get() {
                break;
            }
            callback(&reason);
        }
        true
    }

    /// Run `f` on success. Fires immediately if already succeeded.
    pub fn on_completed(&self, f: impl FnOnce() + 'static) {
        if self.inner.disposed.get() {
            return;
        }
        match self.state() {
            ControllerState::Pending => self.inner.completed.borrow_mut().push(Box::new(f)),
            ControllerState::Succeeded => f(),
            ControllerState::Cancelled(_) => {}
        }
    }

    /// Run `f` on cancellation. Fires immediately if already cancelled.
    pub fn on_cancelled(&self, f: impl FnOnce(&CancelReason) + 'static) {
        if self.inner.disposed.get() {
            return;
        }
        match self.state() {
            ControllerState::Pending => self.inner.cancelled.borrow_mut().push(Box::new(f)),
            ControllerState::Cancelled(reason) => f(&reason),
            ControllerState::Succeeded => {}
        }
    }

    /// Drop every callback. A pending controller resolves its waiters as
    /// `Cancelled(Disposed)` without running callbacks.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.completed.borrow_mut().clear();
        self.inner.cancelled.borrow_mut().clear();
        if self.is_pending() {
            self.inner
                .state
                .send_replace(ControllerState::Cancelled(CancelReason::Disposed));
        }
    }

    /// Suspend until the controller leaves `Pending`.
    pub async fn wait(&self) -> Outcome<()> {
        let mut rx = self.inner.state.subscribe();
        let state = match rx
            .wait_for(|s| !matches!(s, ControllerState::Pending))
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => ControllerState::Cancelled(CancelReason::Disposed),
        };
        match state {
            ControllerState::Cancelled(reason) => Outcome::Cancelled(reason),
            _ => Outcome::Succeeded(()),
        }
    }
}
