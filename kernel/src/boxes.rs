// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Box identifiers and the per-box saved context.
//!
//! A box is a protection compartment. Boxes are numbered from zero, box 0
//! being the trusted main box, and are created once at bring-up in
//! increasing order. They are never destroyed.

use core::cell::Cell;
use core::fmt;

/// Identifier of a box.
///
/// A `BoxId` is only a number; whether it names a configured box is checked
/// against the configured box count by [`crate::vmpu::Vmpu`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BoxId(u8);

impl BoxId {
    /// The trusted main box.
    pub const MAIN: BoxId = BoxId(0);

    pub const fn new(id: u8) -> BoxId {
        BoxId(id)
    }

    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    pub const fn is_main(&self) -> bool {
        self.0 == 0
    }
}

impl From<u8> for BoxId {
    fn from(id: u8) -> BoxId {
        BoxId(id)
    }
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Saved state of a box that the layout manager establishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoxContext {
    /// Initial stack pointer (top of the box stack).
    pub sp: usize,
    /// Base address of the box data (bss) region.
    pub bss: usize,
}

/// Per-box saved contexts, indexed by box ID.
///
/// Written only while boxes are laid out and read by the code that performs
/// the context switch.
pub struct BoxContexts<const NUM_BOXES: usize> {
    contexts: [Cell<BoxContext>; NUM_BOXES],
}

impl<const NUM_BOXES: usize> BoxContexts<NUM_BOXES> {
    pub fn new() -> Self {
        BoxContexts {
            contexts: core::array::from_fn(|_| Cell::new(BoxContext::default())),
        }
    }

    /// Number of configured boxes.
    pub const fn len(&self) -> usize {
        NUM_BOXES
    }

    pub fn get(&self, box_id: BoxId) -> Option<BoxContext> {
        self.contexts.get(box_id.index()).map(Cell::get)
    }

    pub(crate) fn set_sp(&self, box_id: BoxId, sp: usize) {
        if let Some(context) = self.contexts.get(box_id.index()) {
            context.set(BoxContext { sp, ..context.get() });
        }
    }

    pub(crate) fn set_bss(&self, box_id: BoxId, bss: usize) {
        if let Some(context) = self.contexts.get(box_id.index()) {
            context.set(BoxContext { bss, ..context.get() });
        }
    }
}
