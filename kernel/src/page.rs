// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Dynamic page resolution and the external fault-recovery collaborators.

use crate::acl::AclPermissions;
use crate::boxes::BoxId;
use crate::platform::mpu::MPU;
use crate::region_table::MemoryProtection;
use crate::ErrorCode;

/// A page owned by a box, as reported by the page allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRegion {
    /// First address of the region.
    pub start: usize,
    /// First address past the region.
    pub end: usize,
    /// Allocator handle of the page.
    pub page: usize,
}

/// Lookup side of the page allocator.
///
/// Both methods are called from fault context and must neither block nor
/// fault.
pub trait PageAllocator {
    /// Region of the page owned by `box_id` that contains `address`.
    fn find_owning_region(&self, box_id: BoxId, address: usize) -> Option<PageRegion>;

    /// Record a fault against `page` for the allocator's placement and
    /// eviction bookkeeping.
    fn register_fault(&self, page: usize);
}

/// Boards without a page allocator use `()`: no address is owned.
impl PageAllocator for () {
    fn find_owning_region(&self, _box_id: BoxId, _address: usize) -> Option<PageRegion> {
        None
    }

    fn register_fault(&self, _page: usize) {}
}

/// Recovery of bus faults that MPU regions cannot express, such as
/// registers that refuse unprivileged access even when mapped.
pub trait BusFaultRecovery {
    /// Try to complete the faulting access at `pc` on behalf of the box.
    ///
    /// On success the stacked context under `sp` has been updated so that
    /// exception return resumes after the faulting instruction.
    fn recover(&self, pc: u32, sp: usize, fault_address: usize, fault_status: u8)
        -> Result<(), ErrorCode>;
}

/// No corner cases are recovered.
impl BusFaultRecovery for () {
    fn recover(
        &self,
        _pc: u32,
        _sp: usize,
        _fault_address: usize,
        _fault_status: u8,
    ) -> Result<(), ErrorCode> {
        Err(ErrorCode::NOSUPPORT)
    }
}

/// Map the page of the active box that contains `fault_address`.
///
/// Fails with `INVAL` if the address is not inside a page the active box
/// owns, or with the region table's error if the page cannot be mapped.
pub fn resolve_page_fault<M: MPU, const MAX_ACLS: usize>(
    memory: &MemoryProtection<'_, M, MAX_ACLS>,
    pages: &dyn PageAllocator,
    fault_address: usize,
) -> Result<(), ErrorCode> {
    let region = pages
        .find_owning_region(memory.active_box(), fault_address)
        .ok_or(ErrorCode::INVAL)?;

    pages.register_fault(region.page);
    vmpu_debug!(
        "page fault for address {:#010x} at page {} [{:#010x}, {:#010x})",
        fault_address,
        region.page,
        region.start,
        region.end
    );

    memory.push_page_region(region.start, region.end, AclPermissions::DATA)
}
