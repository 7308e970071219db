//! Input abstraction layer.
//!
//! Normalizes pointer and keyboard events into a unified `InputEvent`
//! consumed by the installed event handler. Coordinates are view pixels;
//! the view maps them onto its working plane.

use crate::shortcuts::{ShortcutAction, ShortcutMap};

/// A normalized input event from any pointing device or keyboard.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Pointer pressed. `shift` toggles instead of replacing a selection.
    PointerDown { x: f64, y: f64, shift: bool },

    PointerMove { x: f64, y: f64 },

    PointerUp { x: f64, y: f64 },

    Key {
        key: String,
        ctrl: bool,
        shift: bool,
        alt: bool,
        meta: bool,
    },
}

impl InputEvent {
    /// A bare key press without modifiers.
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key {
            key: key.into(),
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
        }
    }

    /// Extract position if this is a pointer event.
    pub fn position(&self) -> Option<(f64, f64)> {
        match self {
            Self::PointerDown { x, y, .. } | Self::PointerMove { x, y } | Self::PointerUp { x, y } => {
                Some((*x, *y))
            }
            Self::Key { .. } => None,
        }
    }

    /// The shortcut this event triggers, if it is a bound key press.
    pub fn shortcut(&self) -> Option<ShortcutAction> {
        match self {
            Self::Key {
                key,
                ctrl,
                shift,
                alt,
                meta,
            } => ShortcutMap::resolve(key, *ctrl, *shift, *alt, *meta),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_events_carry_position() {
        let e = InputEvent::PointerDown {
            x: 3.0,
            y: 4.0,
            shift: true,
        };
        assert_eq!(e.position(), Some((3.0, 4.0)));
        assert_eq!(InputEvent::key("Escape").position(), None);
    }

    #[test]
    fn keys_resolve_through_shortcut_map() {
        assert_eq!(
            InputEvent::key("Escape").shortcut(),
            Some(ShortcutAction::Cancel)
        );
        let undo = InputEvent::Key {
            key: "z".into(),
            ctrl: true,
            shift: false,
            alt: false,
            meta: false,
        };
        assert_eq!(undo.shortcut(), Some(ShortcutAction::Undo));
        assert_eq!(InputEvent::PointerMove { x: 0.0, y: 0.0 }.shortcut(), None);
    }
}
