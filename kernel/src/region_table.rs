// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Memory ACLs and the live MPU region table.
//!
//! The MPU has far fewer slots than the boxes have regions, so only the
//! active box is ever mapped. The slots are split in four:
//!
//! ```text
//!  reserved | global | static ACLs of the active box | dynamic (page) regions
//!  0        | R      | R + G .. R + G + n            | R + G + n .. total
//! ```
//!
//! Global regions (flash, public SRAM) are shared by every box and are
//! programmed once by [`MemoryProtection::init`]. Static slots are rewritten
//! wholesale on a box switch. Dynamic slots are filled on page faults and
//! reused round-robin; a switch empties them. At least
//! [`MIN_DYNAMIC_REGIONS`] slots are always left for pages.

use core::cell::Cell;

use crate::acl::AclPermissions;
use crate::boxes::BoxId;
use crate::platform::mpu::{Region, MPU};
use crate::utilities::cells::OptionalCell;
use crate::utilities::math;
use crate::ErrorCode;

/// Slots always left for page regions.
pub const MIN_DYNAMIC_REGIONS: usize = 2;

/// Most regions shared by all boxes.
pub const MAX_GLOBAL_REGIONS: usize = 4;

/// Largest region table supported.
const MAX_REGION_SLOTS: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct StaticAcl {
    box_id: BoxId,
    region: Region,
}

/// Memory protection state of all boxes.
///
/// `MAX_ACLS` bounds the number of static memory ACLs across all boxes.
pub struct MemoryProtection<'a, M: MPU, const MAX_ACLS: usize> {
    mpu: &'a M,
    globals: [OptionalCell<Region>; MAX_GLOBAL_REGIONS],
    acls: [OptionalCell<StaticAcl>; MAX_ACLS],
    /// Shadow of the hardware slots, indexed by slot number.
    slots: [OptionalCell<Region>; MAX_REGION_SLOTS],
    initialized: Cell<bool>,
    active_box: Cell<BoxId>,
    first_dynamic: Cell<usize>,
    next_dynamic: Cell<usize>,
}

impl<'a, M: MPU, const MAX_ACLS: usize> MemoryProtection<'a, M, MAX_ACLS> {
    pub fn new(mpu: &'a M) -> Self {
        let reserved = mpu.number_reserved_regions();
        MemoryProtection {
            mpu,
            globals: core::array::from_fn(|_| OptionalCell::empty()),
            acls: core::array::from_fn(|_| OptionalCell::empty()),
            slots: core::array::from_fn(|_| OptionalCell::empty()),
            initialized: Cell::new(false),
            active_box: Cell::new(BoxId::MAIN),
            first_dynamic: Cell::new(reserved),
            next_dynamic: Cell::new(reserved),
        }
    }

    fn total_slots(&self) -> usize {
        core::cmp::min(self.mpu.number_total_regions(), MAX_REGION_SLOTS)
    }

    fn reserved_slots(&self) -> usize {
        self.mpu.number_reserved_regions()
    }

    fn global_slots(&self) -> usize {
        self.globals.iter().filter(|g| g.is_some()).count()
    }

    /// First slot owned by the active box.
    fn box_slots_start(&self) -> usize {
        self.reserved_slots() + self.global_slots()
    }

    /// Number of slots available to the static ACLs of one box.
    pub fn static_slots_per_box(&self) -> usize {
        self.total_slots()
            .saturating_sub(self.box_slots_start())
            .saturating_sub(MIN_DYNAMIC_REGIONS)
    }

    /// Program the reserved and global slots and empty all box slots.
    pub fn init(&self) {
        self.mpu.init_reserved_regions();
        let mut slot = self.reserved_slots();
        for region in self.globals.iter().filter_map(OptionalCell::get) {
            self.mpu.write_region(slot, &region);
            self.slots[slot].set(region);
            slot += 1;
        }
        self.clear_box_slots();
        self.first_dynamic.set(self.box_slots_start());
        self.next_dynamic.set(self.box_slots_start());
        self.initialized.set(true);
    }

    fn clear_box_slots(&self) {
        for slot in self.box_slots_start()..self.total_slots() {
            self.mpu.disable_region(slot);
            self.slots[slot].clear();
        }
    }

    fn check_bounds(&self, start: usize, size: usize) -> Result<usize, ErrorCode> {
        if size == 0 {
            return Err(ErrorCode::SIZE);
        }
        let alignment = self.mpu.region_alignment();
        if !math::is_aligned(start, alignment) || !math::is_aligned(size, alignment) {
            return Err(ErrorCode::INVAL);
        }
        start.checked_add(size).ok_or(ErrorCode::INVAL)
    }

    fn overlaps_global(&self, start: usize, end: usize) -> bool {
        self.globals
            .iter()
            .filter_map(OptionalCell::get)
            .any(|r| math::ranges_overlap(start, end, r.start(), r.end()))
    }

    /// Register a region every box may access, such as flash code.
    ///
    /// Global regions take a slot each for the lifetime of the system, so
    /// they must all be registered before the first static ACL and before
    /// [`init`](Self::init) programs them.
    pub fn add_global_acl(
        &self,
        start: usize,
        size: usize,
        permissions: AclPermissions,
    ) -> Result<(), ErrorCode> {
        let end = self.check_bounds(start, size)?;
        if self.initialized.get() || self.acls.iter().any(OptionalCell::is_some) {
            return Err(ErrorCode::BUSY);
        }
        if self.overlaps_global(start, end) {
            return Err(ErrorCode::ALREADY);
        }
        // Each global takes a slot from every box; keep at least one.
        if self.static_slots_per_box() <= 1 {
            return Err(ErrorCode::NOMEM);
        }
        let free = self
            .globals
            .iter()
            .find(|g| g.is_none())
            .ok_or(ErrorCode::NOMEM)?;
        free.set(Region::new(start, size, permissions));
        Ok(())
    }

    /// Register a static memory ACL for `box_id`.
    ///
    /// Regions of all boxes are kept disjoint from each other and from the
    /// global regions. The ACL becomes live the next time `box_id` is
    /// switched to.
    pub fn add_static_acl(
        &self,
        box_id: BoxId,
        start: usize,
        size: usize,
        permissions: AclPermissions,
    ) -> Result<(), ErrorCode> {
        let end = self.check_bounds(start, size)?;
        if self.overlaps_global(start, end) {
            return Err(ErrorCode::ALREADY);
        }

        let mut owned = 0;
        let mut free = None;
        for (i, entry) in self.acls.iter().enumerate() {
            match entry.get() {
                Some(acl) => {
                    let r = acl.region;
                    if math::ranges_overlap(start, end, r.start(), r.end()) {
                        return Err(ErrorCode::ALREADY);
                    }
                    if acl.box_id == box_id {
                        owned += 1;
                    }
                }
                None => {
                    if free.is_none() {
                        free = Some(i);
                    }
                }
            }
        }

        if owned >= self.static_slots_per_box() {
            return Err(ErrorCode::NOMEM);
        }
        let index = free.ok_or(ErrorCode::NOMEM)?;
        self.acls[index].set(StaticAcl {
            box_id,
            region: Region::new(start, size, permissions),
        });
        Ok(())
    }

    /// Map the page `[start, end)` for the active box.
    ///
    /// Mapping a page that is already live is a no-op. Otherwise the next
    /// dynamic slot is overwritten.
    pub fn push_page_region(
        &self,
        start: usize,
        end: usize,
        permissions: AclPermissions,
    ) -> Result<(), ErrorCode> {
        if end <= start {
            return Err(ErrorCode::SIZE);
        }
        self.check_bounds(start, end - start)?;
        let region = Region::new(start, end - start, permissions);

        let first = self.first_dynamic.get();
        let total = self.total_slots();
        if first >= total {
            return Err(ErrorCode::NOMEM);
        }
        if self.slots[first..total]
            .iter()
            .any(|slot| slot.get() == Some(region))
        {
            return Ok(());
        }

        let mut slot = self.next_dynamic.get();
        if slot < first || slot >= total {
            slot = first;
        }
        self.mpu.write_region(slot, &region);
        self.slots[slot].set(region);
        self.next_dynamic
            .set(if slot + 1 >= total { first } else { slot + 1 });
        Ok(())
    }

    /// Make `dst` the active box: its static ACLs replace everything in the
    /// box slots, and all page regions are dropped. Global slots are left
    /// untouched.
    pub fn switch(&self, dst: BoxId) {
        self.clear_box_slots();

        let mut slot = self.box_slots_start();
        for acl in self.acls.iter().filter_map(OptionalCell::get) {
            if acl.box_id == dst {
                self.mpu.write_region(slot, &acl.region);
                self.slots[slot].set(acl.region);
                slot += 1;
            }
        }

        self.first_dynamic.set(slot);
        self.next_dynamic.set(slot);
        self.active_box.set(dst);
    }

    pub fn active_box(&self) -> BoxId {
        self.active_box.get()
    }

    /// Regions shared by all boxes, in slot order.
    pub fn global_acls(&self) -> impl Iterator<Item = Region> + '_ {
        self.globals.iter().filter_map(OptionalCell::get)
    }

    /// Static memory ACLs registered for `box_id`, in registration order.
    pub fn static_acls(&self, box_id: BoxId) -> impl Iterator<Item = Region> + '_ {
        self.acls
            .iter()
            .filter_map(OptionalCell::get)
            .filter(move |acl| acl.box_id == box_id)
            .map(|acl| acl.region)
    }

    /// Page regions currently mapped for the active box.
    pub fn dynamic_regions(&self) -> impl Iterator<Item = Region> + '_ {
        let first = core::cmp::min(self.first_dynamic.get(), self.total_slots());
        self.slots[first..self.total_slots()]
            .iter()
            .filter_map(OptionalCell::get)
    }
}
