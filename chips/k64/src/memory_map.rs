// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! K64 memory map and box layout constants.

use cortexm::memory_map::{PERIPHERAL_BITBAND, SAFE_REGISTERS, SRAM_BITBAND};
use vmpu::layout::LayoutConfig;
use vmpu::memory_map::{AddressRange, MemoryMap};

use crate::aips::{AIPS0_BASE, AIPS_GRANTABLE_SLOTS, AIPS_SLOT_SIZE};
use crate::sysmpu::REGION_ALIGNMENT;

/// Program flash (MK64FN1M0).
pub const FLASH: AddressRange = AddressRange::new(0x0000_0000, 0x0010_0000);

/// Lower SRAM (SRAM_L), tightly coupled to the code bus.
pub const SRAM_L: AddressRange = AddressRange::new(0x1fff_0000, 0x2000_0000);

/// Upper SRAM (SRAM_U).
pub const SRAM_U: AddressRange = AddressRange::new(0x2000_0000, 0x2003_0000);

/// Smallest stack given to a secure box.
pub const MIN_STACK_SIZE: usize = 1024;

/// Unmapped gap after every box stack and data region.
pub const STACK_BAND_SIZE: usize = 128;

pub const MEMORY_MAP: MemoryMap = MemoryMap {
    safe_registers: SAFE_REGISTERS,
    peripheral_bitband: PERIPHERAL_BITBAND,
    sram_bitband: SRAM_BITBAND,
    peripheral_bridge: AddressRange::new(
        AIPS0_BASE,
        AIPS0_BASE + AIPS_GRANTABLE_SLOTS * AIPS_SLOT_SIZE,
    ),
};

/// Layout constants for a box arena at `[arena_start, arena_end)`, with the
/// main heap starting at `heap_start`. The bounds come from the linker script.
pub const fn layout_config(arena_start: usize, arena_end: usize, heap_start: usize) -> LayoutConfig {
    LayoutConfig {
        region_alignment: REGION_ALIGNMENT,
        min_stack_size: MIN_STACK_SIZE,
        stack_band_size: STACK_BAND_SIZE,
        arena_start,
        arena_end,
        heap_start,
    }
}
