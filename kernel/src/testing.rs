// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Host fakes for the platform traits and external collaborators.

use core::cell::{Cell, RefCell, UnsafeCell};
use core::fmt;
use std::boxed::Box;
use std::panic::{self, AssertUnwindSafe};
use std::string::String;
use std::vec::Vec;

use crate::acl::AclPermissions;
use crate::boxes::BoxId;
use crate::fault::FaultContext;
use crate::halt::{Halt, HaltError};
use crate::layout::LayoutConfig;
use crate::memory_map::{AddressRange, BitBandWindow, MemoryMap, SafeRegister};
use crate::page::{BusFaultRecovery, PageAllocator, PageRegion};
use crate::platform::chip::Chip;
use crate::platform::exceptions::{ExceptionRegisters, FaultStatus};
use crate::platform::mpu::{FaultSyndrome, Region, MPU};
use crate::platform::peripheral::PeripheralAcl;
use crate::utilities::cells::OptionalCell;
use crate::vmpu::{Collaborators, Vmpu};
use crate::ErrorCode;

pub(crate) const BUS_FAULT: u32 = 5;
pub(crate) const EXC_RETURN_PROCESS: usize = 0xffff_fffd;
pub(crate) const EXC_RETURN_MAIN: usize = 0xffff_fff9;
pub(crate) const ARENA_SIZE: usize = 32 * 1024;

pub(crate) const TEST_MEMORY_MAP: MemoryMap = MemoryMap {
    safe_registers: &[SafeRegister {
        address: 0xe000_ed10,
        permissions: AclPermissions::UREAD.union(AclPermissions::UWRITE),
        reason: "SCB->SCR",
    }],
    peripheral_bitband: BitBandWindow {
        alias: AddressRange::new(0x4200_0000, 0x4400_0000),
        target: 0x4000_0000,
    },
    sram_bitband: BitBandWindow {
        alias: AddressRange::new(0x2200_0000, 0x2400_0000),
        target: 0x2000_0000,
    },
    peripheral_bridge: AddressRange::new(0x4000_0000, 0x4010_0000),
};

/// Run `f` and return the message of the halt it triggered, if any.
pub(crate) fn halt_message<F: FnOnce()>(f: F) -> Option<String> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .err()
        .map(|payload| match payload.downcast_ref::<String>() {
            Some(s) => s.clone(),
            None => payload
                .downcast_ref::<&str>()
                .map(|s| String::from(*s))
                .unwrap_or_default(),
        })
}

/// Halts by panicking with `"<category>: <message>"`.
pub(crate) struct FakeHalt;

impl Halt for FakeHalt {
    fn halt(&self, error: HaltError, context: Option<&FaultContext>, message: fmt::Arguments) -> ! {
        if let Some(context) = context {
            // Reports must format without faulting.
            let _ = std::format!("{}", context);
        }
        panic!("{:?}: {}", error, message)
    }
}

pub(crate) struct FakeMpu {
    total: usize,
    slots: [OptionalCell<Region>; 16],
    reserved_initialized: Cell<bool>,
    enabled: Cell<bool>,
    syndrome: Cell<FaultSyndrome>,
    error_addresses: [Cell<usize>; 5],
    cleared_ports: RefCell<Vec<usize>>,
    writes: Cell<usize>,
}

impl FakeMpu {
    pub(crate) const BACKGROUND: Region = Region::new(0, 0x8000_0000, AclPermissions::SACL);

    pub(crate) fn new(total: usize) -> FakeMpu {
        FakeMpu {
            total,
            slots: core::array::from_fn(|_| OptionalCell::empty()),
            reserved_initialized: Cell::new(false),
            enabled: Cell::new(false),
            syndrome: Cell::new(FaultSyndrome::None),
            error_addresses: core::array::from_fn(|_| Cell::new(0)),
            cleared_ports: RefCell::new(Vec::new()),
            writes: Cell::new(0),
        }
    }

    pub(crate) fn region(&self, slot: usize) -> Option<Region> {
        self.slots[slot].get()
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.get()
    }

    pub(crate) fn enabled(&self) -> bool {
        self.enabled.get()
    }

    pub(crate) fn reserved_initialized(&self) -> bool {
        self.reserved_initialized.get()
    }

    pub(crate) fn set_fault(&self, port: usize, address: usize) {
        self.syndrome.set(FaultSyndrome::SlavePort(port));
        self.error_addresses[port].set(address);
    }

    pub(crate) fn set_multiple_faults(&self) {
        self.syndrome.set(FaultSyndrome::Multiple);
    }

    pub(crate) fn cleared_ports(&self) -> Vec<usize> {
        self.cleared_ports.borrow().clone()
    }
}

impl MPU for FakeMpu {
    fn number_total_regions(&self) -> usize {
        self.total
    }

    fn region_alignment(&self) -> usize {
        32
    }

    fn init_reserved_regions(&self) {
        self.slots[0].set(Self::BACKGROUND);
        self.reserved_initialized.set(true);
    }

    fn write_region(&self, slot: usize, region: &Region) {
        self.slots[slot].set(*region);
        self.writes.set(self.writes.get() + 1);
    }

    fn disable_region(&self, slot: usize) {
        self.slots[slot].clear();
    }

    fn fault_syndrome(&self) -> FaultSyndrome {
        self.syndrome.get()
    }

    fn fault_address(&self, port: usize) -> usize {
        self.error_addresses[port].get()
    }

    fn clear_fault(&self, port: usize) {
        self.cleared_ports.borrow_mut().push(port);
        self.syndrome.set(FaultSyndrome::None);
    }

    fn enable(&self) {
        self.enabled.set(true);
    }
}

/// Peripheral ACLs granting `PERIPH` on whole ranges.
pub(crate) struct FakePeripherals {
    grants: RefCell<Vec<(BoxId, usize, usize)>>,
    lookups: Cell<usize>,
    last_lookup: OptionalCell<(BoxId, usize, usize)>,
    switches: RefCell<Vec<(BoxId, BoxId)>>,
    reject_next: Cell<bool>,
}

impl FakePeripherals {
    pub(crate) fn new() -> FakePeripherals {
        FakePeripherals {
            grants: RefCell::new(Vec::new()),
            lookups: Cell::new(0),
            last_lookup: OptionalCell::empty(),
            switches: RefCell::new(Vec::new()),
            reject_next: Cell::new(false),
        }
    }

    pub(crate) fn grant(&self, box_id: BoxId, start: usize, size: usize) {
        self.grants.borrow_mut().push((box_id, start, size));
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.get()
    }

    pub(crate) fn last_lookup(&self) -> Option<(BoxId, usize, usize)> {
        self.last_lookup.get()
    }

    pub(crate) fn switches(&self) -> Vec<(BoxId, BoxId)> {
        self.switches.borrow().clone()
    }

    pub(crate) fn reject_next(&self) {
        self.reject_next.set(true);
    }
}

impl PeripheralAcl for FakePeripherals {
    fn add_acl(
        &self,
        box_id: BoxId,
        start: usize,
        size: usize,
        _permissions: AclPermissions,
    ) -> Result<(), ErrorCode> {
        if self.reject_next.replace(false) {
            return Err(ErrorCode::INVAL);
        }
        self.grant(box_id, start, size);
        Ok(())
    }

    fn find_acl(&self, box_id: BoxId, address: usize, size: usize) -> AclPermissions {
        self.lookups.set(self.lookups.get() + 1);
        self.last_lookup.set((box_id, address, size));
        let covered = self.grants.borrow().iter().any(|&(owner, start, len)| {
            owner == box_id && start <= address && address + size <= start + len
        });
        if covered {
            AclPermissions::PERIPH
        } else {
            AclPermissions::empty()
        }
    }

    fn switch(&self, src: BoxId, dst: BoxId) {
        self.switches.borrow_mut().push((src, dst));
    }
}

pub(crate) struct FakeExceptions {
    ipsr: Cell<u32>,
    psp: Cell<usize>,
    bfar: Cell<usize>,
    bfsr: Cell<u8>,
    stacked_pc: Cell<u32>,
    pc_reads: RefCell<Vec<usize>>,
    cleared: RefCell<Vec<u8>>,
}

impl FakeExceptions {
    fn new() -> FakeExceptions {
        FakeExceptions {
            ipsr: Cell::new(0),
            psp: Cell::new(0),
            bfar: Cell::new(0),
            bfsr: Cell::new(0),
            stacked_pc: Cell::new(0),
            pc_reads: RefCell::new(Vec::new()),
            cleared: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn set_ipsr(&self, ipsr: u32) {
        self.ipsr.set(ipsr);
    }

    pub(crate) fn set_psp(&self, psp: usize) {
        self.psp.set(psp);
    }

    pub(crate) fn set_stacked_pc(&self, pc: u32) {
        self.stacked_pc.set(pc);
    }

    pub(crate) fn set_bus_fault(&self, address: usize, status: u8) {
        self.bfar.set(address);
        self.bfsr.set(status);
    }

    pub(crate) fn stacked_pc_reads(&self) -> Vec<usize> {
        self.pc_reads.borrow().clone()
    }

    /// Bus fault status bits cleared so far, in order.
    pub(crate) fn cleared(&self) -> Vec<u8> {
        self.cleared.borrow().clone()
    }
}

impl ExceptionRegisters for FakeExceptions {
    fn ipsr(&self) -> u32 {
        self.ipsr.get()
    }

    fn psp(&self) -> usize {
        self.psp.get()
    }

    fn bus_fault_address(&self) -> usize {
        self.bfar.get()
    }

    fn bus_fault_status(&self) -> u8 {
        self.bfsr.get()
    }

    fn clear_bus_fault_status(&self, bits: u8) {
        self.cleared.borrow_mut().push(bits);
        self.bfsr.set(self.bfsr.get() & !bits);
    }

    fn fault_status(&self) -> FaultStatus {
        FaultStatus {
            cfsr: u32::from(self.bfsr.get()) << 8,
            bfar: self.bfar.get() as u32,
            ..FaultStatus::default()
        }
    }

    unsafe fn read_unprivileged_u32(&self, address: usize) -> u32 {
        self.pc_reads.borrow_mut().push(address);
        self.stacked_pc.get()
    }
}

pub(crate) struct FakeChip {
    pub(crate) mpu: FakeMpu,
    pub(crate) peripherals: FakePeripherals,
    pub(crate) exceptions: FakeExceptions,
}

impl Chip for FakeChip {
    type MPU = FakeMpu;
    type PeripheralAcl = FakePeripherals;
    type Exceptions = FakeExceptions;

    fn mpu(&self) -> &FakeMpu {
        &self.mpu
    }

    fn peripheral_acl(&self) -> &FakePeripherals {
        &self.peripherals
    }

    fn exceptions(&self) -> &FakeExceptions {
        &self.exceptions
    }

    fn memory_map(&self) -> &MemoryMap {
        &TEST_MEMORY_MAP
    }
}

pub(crate) struct FakePages {
    regions: RefCell<Vec<(BoxId, PageRegion)>>,
    faults: RefCell<Vec<usize>>,
}

impl FakePages {
    pub(crate) fn new() -> FakePages {
        FakePages {
            regions: RefCell::new(Vec::new()),
            faults: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn own(&self, box_id: BoxId, start: usize, end: usize, page: usize) {
        self.regions
            .borrow_mut()
            .push((box_id, PageRegion { start, end, page }));
    }

    pub(crate) fn faults(&self) -> Vec<usize> {
        self.faults.borrow().clone()
    }
}

impl PageAllocator for FakePages {
    fn find_owning_region(&self, box_id: BoxId, address: usize) -> Option<PageRegion> {
        self.regions
            .borrow()
            .iter()
            .find(|(owner, r)| *owner == box_id && r.start <= address && address < r.end)
            .map(|&(_, r)| r)
    }

    fn register_fault(&self, page: usize) {
        self.faults.borrow_mut().push(page);
    }
}

pub(crate) struct FakeBusRecovery {
    succeed: Cell<bool>,
    calls: Cell<usize>,
    last_call: OptionalCell<(u32, usize, usize, u8)>,
}

impl FakeBusRecovery {
    pub(crate) fn succeed(&self) {
        self.succeed.set(true);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }

    pub(crate) fn last_call(&self) -> Option<(u32, usize, usize, u8)> {
        self.last_call.get()
    }
}

impl BusFaultRecovery for FakeBusRecovery {
    fn recover(
        &self,
        pc: u32,
        sp: usize,
        fault_address: usize,
        fault_status: u8,
    ) -> Result<(), ErrorCode> {
        self.calls.set(self.calls.get() + 1);
        self.last_call.set((pc, sp, fault_address, fault_status));
        if self.succeed.get() {
            Ok(())
        } else {
            Err(ErrorCode::FAIL)
        }
    }
}

#[repr(C, align(32))]
struct ArenaMemory(UnsafeCell<[u8; ARENA_SIZE]>);

pub(crate) type TestVmpu<'a> = Vmpu<'a, FakeChip, 4, 16>;

/// A chip, its collaborators and a real box arena.
pub(crate) struct FakeSystem {
    pub(crate) chip: FakeChip,
    pub(crate) pages: FakePages,
    pub(crate) bus_recovery: FakeBusRecovery,
    pub(crate) halt: FakeHalt,
    pub(crate) layout: LayoutConfig,
    arena: Box<ArenaMemory>,
}

impl FakeSystem {
    pub(crate) fn new() -> FakeSystem {
        let arena = Box::new(ArenaMemory(UnsafeCell::new([0; ARENA_SIZE])));
        let start = arena.0.get() as usize;
        FakeSystem {
            chip: FakeChip {
                mpu: FakeMpu::new(12),
                peripherals: FakePeripherals::new(),
                exceptions: FakeExceptions::new(),
            },
            pages: FakePages::new(),
            bus_recovery: FakeBusRecovery {
                succeed: Cell::new(false),
                calls: Cell::new(0),
                last_call: OptionalCell::empty(),
            },
            halt: FakeHalt,
            layout: LayoutConfig {
                region_alignment: 32,
                min_stack_size: 4096,
                stack_band_size: 1024,
                arena_start: start,
                arena_end: start + ARENA_SIZE,
                heap_start: 0x1fff_8000,
            },
            arena,
        }
    }

    pub(crate) fn vmpu(&self) -> TestVmpu<'_> {
        Vmpu::new(
            &self.chip,
            self.layout,
            Collaborators {
                pages: &self.pages,
                bus_recovery: &self.bus_recovery,
                halt: &self.halt,
            },
        )
    }

    pub(crate) fn fill_arena(&self, value: u8) {
        // SAFETY: the arena is only accessed through raw pointers.
        unsafe { core::ptr::write_bytes(self.arena.0.get() as *mut u8, value, ARENA_SIZE) }
    }

    pub(crate) fn arena_bytes(&self, address: usize, len: usize) -> Vec<u8> {
        let start = self.arena.0.get() as usize;
        assert!(address >= start && address + len <= start + ARENA_SIZE);
        // SAFETY: the range was checked to lie inside the arena.
        unsafe { core::slice::from_raw_parts(address as *const u8, len).to_vec() }
    }
}
