// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! ARMv7-M support for the virtual MPU.
//!
//! Provides the system exception trampoline, access to the SCB fault
//! registers, the halt routine and the architecture-defined parts of the
//! memory map.

#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod exceptions;
pub mod fault_status;
pub mod halt;
pub mod handler;
pub mod memory_map;
pub mod scb;
pub mod support;

// Table 2.5
// http://infocenter.arm.com/help/index.jsp?topic=/com.arm.doc.dui0553a/CHDBIBGJ.html
pub fn ipsr_isr_number_to_str(isr_number: usize) -> &'static str {
    match isr_number {
        0 => "Thread Mode",
        1 => "Reserved",
        2 => "NMI",
        3 => "HardFault",
        4 => "MemManage",
        5 => "BusFault",
        6 => "UsageFault",
        7..=10 => "Reserved",
        11 => "SVCall",
        12 => "DebugMonitor",
        13 => "Reserved",
        14 => "PendSV",
        15 => "SysTick",
        16..=255 => "IRQn",
        _ => "(Unknown! Illegal value?)",
    }
}
