// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! The process-wide protection state.
//!
//! A single [`Vmpu`] owns the box contexts, the memory ACLs and the live
//! region table, the arena cursor and the active box. It is created once
//! at bring-up and then only touched from bring-up code, from the box switch
//! path and from the fault dispatcher. All three run serialized on a single
//! core, so the state lives in `Cell`s. A multi-core port must wrap every
//! entry point in a critical section.

use core::cell::Cell;
use core::fmt;

use crate::acl::{self, AclPermissions};
use crate::boxes::{BoxContexts, BoxId};
use crate::fault::FaultContext;
use crate::halt::{Halt, HaltError};
use crate::layout::{Arena, LayoutConfig};
use crate::page::{BusFaultRecovery, PageAllocator};
use crate::platform::chip::Chip;
use crate::platform::mpu::MPU;
use crate::platform::peripheral::PeripheralAcl;
use crate::region_table::MemoryProtection;

/// Privileged handlers for exceptions the monitor forwards rather than
/// handles itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrivilegedHooks {
    pub pendsv: Option<fn()>,
    pub systick: Option<fn()>,
}

/// External collaborators the engine calls into.
pub struct Collaborators<'a> {
    pub pages: &'a dyn PageAllocator,
    pub bus_recovery: &'a dyn BusFaultRecovery,
    pub halt: &'a dyn Halt,
}

/// Virtual MPU for `NUM_BOXES` boxes and at most `MAX_ACLS` static memory
/// ACLs.
pub struct Vmpu<'a, C: Chip, const NUM_BOXES: usize, const MAX_ACLS: usize> {
    pub(crate) chip: &'a C,
    pub(crate) memory: MemoryProtection<'a, C::MPU, MAX_ACLS>,
    pub(crate) contexts: BoxContexts<NUM_BOXES>,
    pub(crate) layout: LayoutConfig,
    pub(crate) arena: Arena,
    pub(crate) pages: &'a dyn PageAllocator,
    pub(crate) bus_recovery: &'a dyn BusFaultRecovery,
    halt: &'a dyn Halt,
    pub(crate) hooks: Cell<PrivilegedHooks>,
    pub(crate) in_fault: Cell<bool>,
}

impl<'a, C: Chip, const NUM_BOXES: usize, const MAX_ACLS: usize> Vmpu<'a, C, NUM_BOXES, MAX_ACLS> {
    pub fn new(chip: &'a C, layout: LayoutConfig, collaborators: Collaborators<'a>) -> Self {
        Vmpu {
            chip,
            memory: MemoryProtection::new(chip.mpu()),
            contexts: BoxContexts::new(),
            layout,
            arena: Arena::new(),
            pages: collaborators.pages,
            bus_recovery: collaborators.bus_recovery,
            halt: collaborators.halt,
            hooks: Cell::new(PrivilegedHooks::default()),
            in_fault: Cell::new(false),
        }
    }

    pub(crate) fn fatal(
        &self,
        error: HaltError,
        context: Option<&FaultContext>,
        message: fmt::Arguments,
    ) -> ! {
        self.halt.halt(error, context, message)
    }

    fn check_box_id(&self, box_id: BoxId, role: &str) {
        if box_id.index() >= NUM_BOXES {
            self.fatal(
                HaltError::SanityCheckFailed,
                None,
                format_args!(
                    "vMPU switch: The {} box ID is out of range ({}).",
                    role, box_id
                ),
            );
        }
    }

    /// Bring up the MPU: program the reserved and global slots, empty all
    /// box slots and enable protection.
    pub fn init(&self) {
        self.memory.init();
        self.chip.mpu().enable();
    }

    /// Make box 0 live. Loading any other box is not supported.
    pub fn load_box(&self, box_id: BoxId) {
        if !box_id.is_main() {
            self.fatal(
                HaltError::NotImplemented,
                None,
                format_args!("currently only box 0 can be loaded"),
            );
        }
        self.chip.peripheral_acl().switch(box_id, box_id);
        self.memory.switch(box_id);
        vmpu_debug!("box {} loaded", box_id);
    }

    /// Transfer protection from box `src` to box `dst`.
    ///
    /// Both peripheral and memory ACLs of `dst` fully replace those of
    /// `src`, and page regions mapped for `src` are dropped.
    pub fn switch(&self, src: BoxId, dst: BoxId) {
        self.check_box_id(src, "source");
        self.check_box_id(dst, "destination");
        if self.in_fault.get() {
            self.fatal(
                HaltError::NotAllowed,
                None,
                format_args!("vMPU switch: a fault is still being handled"),
            );
        }

        self.chip.peripheral_acl().switch(src, dst);
        self.memory.switch(dst);
    }

    /// Permissions the active box statically holds at `address`.
    pub fn resolve_static_acl(&self, address: usize, size: usize) -> AclPermissions {
        acl::find_static_acl(
            self.chip.memory_map(),
            self.chip.peripheral_acl(),
            self.memory.active_box(),
            address,
            size,
        )
    }

    /// Grant `box_id` access to the peripherals in `[start, start + size)`.
    pub fn add_peripheral_acl(
        &self,
        box_id: BoxId,
        start: usize,
        size: usize,
        permissions: AclPermissions,
    ) {
        if box_id.index() >= NUM_BOXES {
            self.fatal(
                HaltError::SanityCheckFailed,
                None,
                format_args!("box ID out of range ({})", box_id),
            );
        }
        if let Err(e) = self
            .chip
            .peripheral_acl()
            .add_acl(box_id, start, size, permissions | AclPermissions::PERIPHERAL)
        {
            self.fatal(
                HaltError::SanityCheckFailed,
                None,
                format_args!(
                    "peripheral ACL [{:#010x}, +{:#x}) for box {} rejected: {}",
                    start, size, box_id, e
                ),
            );
        }
    }

    /// Make `[start, start + size)` accessible to every box, for example
    /// flash code or public SRAM.
    ///
    /// Must be called before [`init`](Self::init) and before any box is
    /// laid out.
    pub fn add_global_acl(&self, start: usize, size: usize, permissions: AclPermissions) {
        if let Err(e) = self.memory.add_global_acl(start, size, permissions) {
            self.fatal(
                HaltError::SanityCheckFailed,
                None,
                format_args!(
                    "global region [{:#010x}, +{:#x}) rejected: {}",
                    start, size, e
                ),
            );
        }
    }

    /// Install handlers for PendSV and SysTick.
    pub fn register_privileged_hooks(&self, hooks: PrivilegedHooks) {
        self.hooks.set(hooks);
    }

    pub fn active_box(&self) -> BoxId {
        self.memory.active_box()
    }

    pub fn contexts(&self) -> &BoxContexts<NUM_BOXES> {
        &self.contexts
    }

    pub fn memory(&self) -> &MemoryProtection<'a, C::MPU, MAX_ACLS> {
        &self.memory
    }

    pub fn region_alignment(&self) -> usize {
        self.chip.mpu().region_alignment()
    }
}
