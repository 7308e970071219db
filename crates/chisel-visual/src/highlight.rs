//! Highlight bookkeeping.
//!
//! The highlighter is a set of `(visual, state, shape type, sub-indices)`
//! keys. A renderer draws emphasis for whatever is in the set; the revision
//! counter lets the context tell whether the last redraw saw the current set.

use crate::context::VisualId;
use chisel_core::ShapeType;
use smallvec::SmallVec;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VisualState {
    EdgeHighlight,
    EdgeSelected,
    FaceHighlight,
    FaceSelected,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HighlightKey {
    pub visual: VisualId,
    pub state: VisualState,
    pub shape_type: ShapeType,
    pub indexes: SmallVec<[usize; 4]>,
}

impl HighlightKey {
    /// Whole-shape key.
    pub fn whole(visual: VisualId, state: VisualState) -> Self {
        Self {
            visual,
            state,
            shape_type: ShapeType::Shape,
            indexes: SmallVec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Highlighter {
    keys: BTreeSet<HighlightKey>,
    revision: u64,
}

impl Highlighter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the key was not present.
    pub fn add(&mut self, key: HighlightKey) -> bool {
        let added = self.keys.insert(key);
        if added {
            self.revision += 1;
        }
        added
    }

    /// Returns `true` if the key was present.
    pub fn remove(&mut self, key: &HighlightKey) -> bool {
        let removed = self.keys.remove(key);
        if removed {
            self.revision += 1;
        }
        removed
    }

    pub fn contains(&self, key: &HighlightKey) -> bool {
        self.keys.contains(key)
    }

    /// Drop every key of `visual`. Returns how many were removed.
    pub fn clear_visual(&mut self, visual: VisualId) -> usize {
        let before = self.keys.len();
        self.keys.retain(|k| k.visual != visual);
        let removed = before - self.keys.len();
        if removed > 0 {
            self.revision += 1;
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.keys.is_empty() {
            self.keys.clear();
            self.revision += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn keys(&self) -> impl Iterator<Item = &HighlightKey> {
        self.keys.iter()
    }
}
