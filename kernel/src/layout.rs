// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Box memory layout.
//!
//! Boxes other than box 0 get their stack and data regions from a shared
//! arena, in box ID order, each region followed by a guard band:
//!
//! ```text
//!  arena_start (rounded up)
//!  | band | stack 1 | band | data 1 | band | stack 2 | band | data 2 | band | ...
//! ```
//!
//! A guard band is never mapped, so a small overrun past a region faults
//! instead of reaching the next box. Box 0 keeps the stack and heap it was
//! started with.

use core::cell::Cell;

use crate::acl::AclPermissions;
use crate::boxes::BoxId;
use crate::halt::HaltError;
use crate::platform::chip::Chip;
use crate::platform::exceptions::ExceptionRegisters;
use crate::utilities::cells::OptionalCell;
use crate::utilities::math;
use crate::vmpu::Vmpu;
use crate::ErrorCode;

/// Platform layout constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutConfig {
    /// Granularity of region bounds, a power of two.
    pub region_alignment: usize,
    /// Smallest stack handed to a box.
    pub min_stack_size: usize,
    /// Size of the guard band between regions.
    pub stack_band_size: usize,
    /// Start of the shared box arena.
    pub arena_start: usize,
    /// End of the shared box arena (exclusive).
    pub arena_end: usize,
    /// Start of the main heap, used as box 0's data base.
    pub heap_start: usize,
}

impl LayoutConfig {
    /// Stack size actually reserved for a request of `size` bytes.
    pub fn stack_size(&self, size: usize) -> Option<usize> {
        math::round_up(core::cmp::max(size, self.min_stack_size), self.region_alignment)
    }

    /// Data region size actually reserved for a request of `size` bytes.
    pub fn data_size(&self, size: usize) -> Option<usize> {
        math::round_up(size, self.region_alignment)
    }

    /// Where the first box is placed.
    fn first_cursor(&self) -> Option<usize> {
        math::round_up(self.arena_start, self.region_alignment)?.checked_add(self.stack_band_size)
    }
}

/// Arena cursor state.
pub(crate) struct Arena {
    /// Next free address. Set when the first non-main box is laid out and
    /// only ever increases.
    cursor: OptionalCell<usize>,
    /// The box that must be laid out next.
    next_box: Cell<usize>,
}

impl Arena {
    pub(crate) const fn new() -> Arena {
        Arena {
            cursor: OptionalCell::empty(),
            next_box: Cell::new(0),
        }
    }
}

/// Bounds chosen for one box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BoxPlacement {
    stack: usize,
    stack_size: usize,
    data: usize,
    data_size: usize,
    next_cursor: usize,
}

fn place(config: &LayoutConfig, cursor: usize, bss_size: usize, stack_size: usize) -> Option<BoxPlacement> {
    let band = config.stack_band_size;
    let stack_size = config.stack_size(stack_size)?;
    let data_size = config.data_size(bss_size)?;
    let data = cursor.checked_add(stack_size)?.checked_add(band)?;
    let next_cursor = data.checked_add(data_size)?.checked_add(band)?;
    Some(BoxPlacement {
        stack: cursor,
        stack_size,
        data,
        data_size,
        next_cursor,
    })
}

impl<C: Chip, const NUM_BOXES: usize, const MAX_ACLS: usize> Vmpu<'_, C, NUM_BOXES, MAX_ACLS> {
    /// Lay out the stack and data regions of `box_id`.
    ///
    /// Must be called once per box, in increasing ID order, during bring-up.
    /// Box 0 takes no stack (`stack_size` must be 0) and keeps the current
    /// process stack and the main heap. Every other box gets a stack of at
    /// least the minimum stack size and a zeroed data region of `bss_size`
    /// bytes, both registered as static ACLs. Any violation halts.
    pub fn lay_out_box(&self, box_id: BoxId, bss_size: usize, stack_size: usize) {
        if box_id.index() >= NUM_BOXES || box_id.index() != self.arena.next_box.get() {
            self.fatal(
                HaltError::SanityCheckFailed,
                None,
                format_args!(
                    "box {} laid out out of order, expected box {}",
                    box_id,
                    self.arena.next_box.get()
                ),
            );
        }

        if box_id.is_main() {
            if stack_size != 0 {
                self.fatal(
                    HaltError::SanityCheckFailed,
                    None,
                    format_args!("box 0 must not request a stack ({} bytes)", stack_size),
                );
            }
            self.contexts.set_sp(box_id, self.chip.exceptions().psp());
            self.contexts.set_bss(box_id, self.layout.heap_start);
            vmpu_debug!("ctx={} stack={}", bss_size, stack_size);
            self.arena.next_box.set(1);
            return;
        }

        if bss_size == 0 {
            self.fatal(
                HaltError::SanityCheckFailed,
                None,
                format_args!("box {} requested an empty data region", box_id),
            );
        }

        let cursor = match self.arena.cursor.get().or_else(|| self.layout.first_cursor()) {
            Some(cursor) => cursor,
            None => self.arena_exhausted(box_id),
        };
        let placement = match place(&self.layout, cursor, bss_size, stack_size) {
            Some(p) if p.next_cursor <= self.layout.arena_end => p,
            _ => self.arena_exhausted(box_id),
        };

        self.add_layout_acl(
            box_id,
            placement.stack,
            placement.stack_size,
            AclPermissions::STACK_REGION,
        );
        self.contexts
            .set_sp(box_id, placement.stack + placement.stack_size);

        self.add_layout_acl(box_id, placement.data, placement.data_size, AclPermissions::DATA);
        // SAFETY: the ACL was accepted, so the data region lies in the box
        // arena and overlaps no other region. It only becomes reachable at
        // the next switch to `box_id`.
        unsafe {
            core::ptr::write_bytes(placement.data as *mut u8, 0, placement.data_size);
        }
        self.contexts.set_bss(box_id, placement.data);

        self.arena.cursor.set(placement.next_cursor);
        self.arena.next_box.set(box_id.index() + 1);

        vmpu_debug!(
            "box {}: stack [{:#010x}, +{:#x}) data [{:#010x}, +{:#x})",
            box_id,
            placement.stack,
            placement.stack_size,
            placement.data,
            placement.data_size
        );
    }

    fn add_layout_acl(&self, box_id: BoxId, start: usize, size: usize, permissions: AclPermissions) {
        if let Err(e) = self.memory.add_static_acl(box_id, start, size, permissions) {
            let error = match e {
                ErrorCode::NOMEM => HaltError::OutOfMemory,
                _ => HaltError::SanityCheckFailed,
            };
            self.fatal(
                error,
                None,
                format_args!(
                    "box {} region [{:#010x}, +{:#x}) rejected: {}",
                    box_id, start, size, e
                ),
            );
        }
    }

    fn arena_exhausted(&self, box_id: BoxId) -> ! {
        self.fatal(
            HaltError::OutOfMemory,
            None,
            format_args!("box {} does not fit in the box arena", box_id),
        )
    }

    /// Next free address in the box arena, once a box has been placed there.
    pub fn arena_cursor(&self) -> Option<usize> {
        self.arena.cursor.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::BoxContext;
    use crate::testing::{halt_message, FakeSystem, ARENA_SIZE};
    use crate::utilities::math::ranges_overlap;
    use std::vec::Vec;

    const BOX1: BoxId = BoxId::new(1);
    const BOX2: BoxId = BoxId::new(2);
    const BOX3: BoxId = BoxId::new(3);

    #[test]
    fn stack_and_data_sizes_are_rounded() {
        let config = LayoutConfig {
            region_alignment: 32,
            min_stack_size: 4096,
            stack_band_size: 1024,
            arena_start: 0x2000_0010,
            arena_end: 0x2001_0000,
            heap_start: 0x1fff_0000,
        };
        assert_eq!(config.stack_size(512), Some(4096));
        assert_eq!(config.stack_size(4097), Some(4128));
        assert_eq!(config.data_size(256), Some(256));
        assert_eq!(config.data_size(257), Some(288));
        assert_eq!(config.first_cursor(), Some(0x2000_0020 + 1024));
        assert_eq!(config.stack_size(usize::MAX), None);
    }

    #[test]
    fn main_box_keeps_its_stack_and_heap() {
        let system = FakeSystem::new();
        let vmpu = system.vmpu();
        system.chip.exceptions.set_psp(0x2000_7f00);

        vmpu.lay_out_box(BoxId::MAIN, 0, 0);

        assert_eq!(
            vmpu.contexts().get(BoxId::MAIN),
            Some(BoxContext {
                sp: 0x2000_7f00,
                bss: system.layout.heap_start
            })
        );
        assert_eq!(vmpu.memory().static_acls(BoxId::MAIN).count(), 0);
        assert_eq!(vmpu.arena_cursor(), None);
    }

    #[test]
    #[should_panic(expected = "box 0 must not request a stack")]
    fn main_box_stack_request_halts() {
        let system = FakeSystem::new();
        system.vmpu().lay_out_box(BoxId::MAIN, 0, 1024);
    }

    #[test]
    fn box_regions_follow_guard_bands() {
        let system = FakeSystem::new();
        let vmpu = system.vmpu();
        let base = system.layout.arena_start;

        vmpu.lay_out_box(BoxId::MAIN, 0, 0);
        vmpu.lay_out_box(BOX1, 256, 512);

        let stack = base + 1024;
        let data = stack + 4096 + 1024;
        let regions: Vec<_> = vmpu.memory().static_acls(BOX1).collect();
        assert_eq!(regions.len(), 2);
        assert_eq!((regions[0].start(), regions[0].size()), (stack, 4096));
        assert_eq!(regions[0].permissions(), AclPermissions::STACK_REGION);
        assert_eq!((regions[1].start(), regions[1].size()), (data, 256));
        assert_eq!(regions[1].permissions(), AclPermissions::DATA);
        assert_eq!(
            vmpu.contexts().get(BOX1),
            Some(BoxContext {
                sp: stack + 4096,
                bss: data
            })
        );
        // stack + band + data + band past the first cursor.
        assert_eq!(vmpu.arena_cursor(), Some(stack + 4096 + 1024 + 256 + 1024));
    }

    #[test]
    fn arena_grows_monotonically_and_boxes_stay_disjoint() {
        let system = FakeSystem::new();
        let vmpu = system.vmpu();
        vmpu.lay_out_box(BoxId::MAIN, 0, 0);

        let mut before = system.layout.arena_start + 1024;
        for (box_id, bss, stack) in [(BOX1, 100, 0), (BOX2, 600, 5000), (BOX3, 32, 4096)] {
            vmpu.lay_out_box(box_id, bss, stack);
            let after = vmpu.arena_cursor().unwrap();
            assert!(after > before);
            for region in vmpu.memory().static_acls(box_id) {
                assert!(region.start() >= before && region.end() <= after);
            }
            before = after;
        }

        let all: Vec<(BoxId, _)> = [BOX1, BOX2, BOX3]
            .iter()
            .flat_map(|&b| vmpu.memory().static_acls(b).map(move |r| (b, r)))
            .collect();
        for (b1, r1) in &all {
            for (b2, r2) in &all {
                if b1 != b2 {
                    assert!(!ranges_overlap(r1.start(), r1.end(), r2.start(), r2.end()));
                }
            }
        }
    }

    #[test]
    fn data_region_is_zeroed() {
        let system = FakeSystem::new();
        let vmpu = system.vmpu();
        system.fill_arena(0xa5);

        vmpu.lay_out_box(BoxId::MAIN, 0, 0);
        vmpu.lay_out_box(BOX1, 200, 0);

        let data = vmpu.contexts().get(BOX1).unwrap().bss;
        let bytes = system.arena_bytes(data, 224);
        assert!(bytes.iter().all(|&b| b == 0));
        // Guard band after the data region is untouched.
        assert!(system.arena_bytes(data + 224, 1024).iter().all(|&b| b == 0xa5));
    }

    #[test]
    fn rejected_data_region_is_not_zeroed() {
        let system = FakeSystem::new();
        let vmpu = system.vmpu();
        system.fill_arena(0xa5);
        // Box 1's data region would land on a region shared by all boxes.
        let data = system.layout.arena_start + 1024 + 4096 + 1024;
        vmpu.memory()
            .add_global_acl(data, 256, AclPermissions::DATA)
            .unwrap();

        vmpu.lay_out_box(BoxId::MAIN, 0, 0);
        let message = halt_message(|| vmpu.lay_out_box(BOX1, 200, 0));

        assert!(message.is_some_and(|m| m.starts_with("SanityCheckFailed")));
        assert!(system.arena_bytes(data, 256).iter().all(|&b| b == 0xa5));
    }

    #[test]
    fn layout_errors_halt() {
        let system = FakeSystem::new();
        let vmpu = system.vmpu();

        let skipped = halt_message(|| vmpu.lay_out_box(BOX1, 32, 0));
        assert!(skipped.is_some_and(|m| m.contains("out of order, expected box 0")));

        vmpu.lay_out_box(BoxId::MAIN, 0, 0);
        let repeated = halt_message(|| vmpu.lay_out_box(BoxId::MAIN, 0, 0));
        assert!(repeated.is_some_and(|m| m.starts_with("SanityCheckFailed")));

        let empty = halt_message(|| vmpu.lay_out_box(BOX1, 0, 0));
        assert!(empty.is_some_and(|m| m.contains("empty data region")));
        assert_eq!(vmpu.arena_cursor(), None);

        let huge = halt_message(|| vmpu.lay_out_box(BOX1, ARENA_SIZE, 0));
        assert!(huge.is_some_and(|m| m.starts_with("OutOfMemory")));
        assert_eq!(vmpu.memory().static_acls(BOX1).count(), 0);
    }
}
