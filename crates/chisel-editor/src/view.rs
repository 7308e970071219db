//! View: the input surface a document is edited through.
//!
//! Input goes to the top of a handler stack, or to the base handler when the
//! stack is empty. Every pick installs one handler bound to its controller
//! and uninstalls it on teardown. Uninstalling a handler first unwinds every
//! handler above it, top first, so nested picks always balance.
//!
//! A closed view cancels every pending pick with `ViewClosed` and ignores
//! any input that still arrives.

use crate::controller::AsyncController;
use crate::document::Document;
use crate::error::CancelReason;
use crate::event::{CursorType, ViewCursor};
use crate::handlers::DefaultHandler;
use crate::input::InputEvent;
use chisel_core::{Plane, XYZ};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Receives input while installed on a view.
pub trait EventHandler {
    fn name(&self) -> &'static str;

    fn handle(&self, view: &View, event: &InputEvent);

    /// Release highlights and previews owned by the handler. Called once,
    /// when the handler leaves the stack.
    fn dispose(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerToken(u64);

struct Installed {
    token: HandlerToken,
    handler: Rc<dyn EventHandler>,
    controller: AsyncController,
}

pub struct View {
    document: Rc<Document>,
    base: Rc<dyn EventHandler>,
    stack: RefCell<Vec<Installed>>,
    next_token: Cell<u64>,
    closed: Cell<bool>,
    cursor: Cell<CursorType>,
    workplane: Cell<Plane>,
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("document", &self.document.id())
            .field("handlers", &self.handler_depth())
            .field("closed", &self.closed.get())
            .finish()
    }
}

impl View {
    pub fn new(document: Rc<Document>) -> Rc<View> {
        Rc::new(View {
            document,
            base: Rc::new(DefaultHandler),
            stack: RefCell::new(Vec::new()),
            next_token: Cell::new(0),
            closed: Cell::new(false),
            cursor: Cell::new(CursorType::Default),
            workplane: Cell::new(Plane::XY),
        })
    }

    pub fn document(&self) -> &Rc<Document> {
        &self.document
    }

    // ─── Handler stack ───────────────────────────────────────────────────

    pub fn install(&self, handler: Rc<dyn EventHandler>, controller: AsyncController) -> HandlerToken {
        let token = HandlerToken(self.next_token.get());
        self.next_token.set(token.0 + 1);
        log::debug!("install {} (depth {})", handler.name(), self.handler_depth() + 1);
        self.stack.borrow_mut().push(Installed {
            token,
            handler,
            controller,
        });
        token
    }

    fn remove(&self, token: HandlerToken) -> Option<Installed> {
        let mut stack = self.stack.borrow_mut();
        let pos = stack.iter().position(|i| i.token == token)?;
        Some(stack.remove(pos))
    }

    /// Remove the handler for `token`, unwinding the handlers above it first.
    /// Unknown tokens are ignored, so teardown may call this more than once.
    pub fn uninstall(&self, token: HandlerToken) {
        loop {
            let above = {
                let stack = self.stack.borrow();
                let Some(pos) = stack.iter().position(|i| i.token == token) else {
                    return;
                };
                if pos + 1 == stack.len() {
                    None
                } else {
                    stack.last().map(|top| (top.token, top.controller.clone()))
                }
            };
            let Some((top, controller)) = above else {
                break;
            };
            // The pick's own teardown normally uninstalls it on cancel.
            controller.cancel(CancelReason::Unwound);
            if let Some(installed) = self.remove(top) {
                installed.handler.dispose();
            }
        }
        if let Some(installed) = self.remove(token) {
            log::debug!("uninstall {}", installed.handler.name());
            installed.handler.dispose();
        }
    }

    /// Cancel and unwind every pick that `controller` does not strictly
    /// descend from, so a new pick either nests inside the active one or
    /// replaces it. A handler already serving `controller` itself is
    /// uninstalled without resolving the controller; the new pick takes
    /// its place.
    pub fn supersede(&self, controller: &AsyncController) {
        loop {
            let top = self
                .stack
                .borrow()
                .last()
                .map(|i| (i.token, i.controller.clone()));
            let Some((token, active)) = top else {
                return;
            };
            if active == *controller {
                log::debug!("pick {} restarted", controller.id());
                self.uninstall(token);
                continue;
            }
            if controller.is_descendant_of(&active) {
                return;
            }
            log::debug!("pick {} superseded by {}", active.id(), controller.id());
            active.cancel(CancelReason::Superseded);
            self.uninstall(token);
        }
    }

    /// Number of installed handlers, not counting the base handler.
    pub fn handler_depth(&self) -> usize {
        self.stack.borrow().len()
    }

    /// Controller of the innermost pending pick.
    pub fn active_pick(&self) -> Option<AsyncController> {
        self.stack.borrow().last().map(|i| i.controller.clone())
    }

    pub fn active_handler_name(&self) -> &'static str {
        match self.stack.borrow().last() {
            Some(installed) => installed.handler.name(),
            None => self.base.name(),
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Cancel every pending pick with `ViewClosed` and stop taking input.
    pub fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        log::debug!("view of document {:?} closed", self.document.id());
        let controllers: Vec<_> = self
            .stack
            .borrow()
            .iter()
            .rev()
            .map(|i| i.controller.clone())
            .collect();
        for controller in controllers {
            controller.cancel(CancelReason::ViewClosed);
        }
        let leftover = std::mem::take(&mut *self.stack.borrow_mut());
        for installed in leftover.into_iter().rev() {
            installed.handler.dispose();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    // ─── Cursor & plane ──────────────────────────────────────────────────

    pub fn cursor(&self) -> CursorType {
        self.cursor.get()
    }

    pub fn set_cursor(&self, cursor: CursorType) {
        if self.cursor.replace(cursor) != cursor {
            self.document.bus().publish::<ViewCursor>(cursor);
        }
    }

    pub fn workplane(&self) -> Plane {
        self.workplane.get()
    }

    pub fn set_workplane(&self, plane: Plane) {
        self.workplane.set(plane);
    }

    /// Plan view: one world unit per pixel on the working plane.
    pub fn screen_to_world(&self, x: f64, y: f64) -> XYZ {
        self.workplane.get().to_world(x, y)
    }

    // ─── Input ───────────────────────────────────────────────────────────

    pub fn dispatch(&self, event: InputEvent) {
        if self.closed.get() {
            log::trace!("closed view ignores {event:?}");
            return;
        }
        let handler = self
            .stack
            .borrow()
            .last()
            .map(|i| i.handler.clone())
            .unwrap_or_else(|| self.base.clone());
        handler.handle(self, &event);
    }

    pub fn pointer_move(&self, x: f64, y: f64) {
        self.dispatch(InputEvent::PointerMove { x, y });
    }

    pub fn click(&self, x: f64, y: f64) {
        self.click_with(x, y, false);
    }

    pub fn shift_click(&self, x: f64, y: f64) {
        self.click_with(x, y, true);
    }

    fn click_with(&self, x: f64, y: f64, shift: bool) {
        self.dispatch(InputEvent::PointerDown { x, y, shift });
        self.dispatch(InputEvent::PointerUp { x, y });
    }

    pub fn key(&self, key: &str) {
        self.dispatch(InputEvent::key(key));
    }
}
