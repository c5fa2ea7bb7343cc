// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface to the core's exception and fault-status registers.

use core::fmt;

/// Raw snapshot of the fault status registers, taken for reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaultStatus {
    /// Configurable fault status (MMFSR, BFSR and UFSR).
    pub cfsr: u32,
    /// Hard fault status.
    pub hfsr: u32,
    /// Debug fault status.
    pub dfsr: u32,
    /// Memory management fault address.
    pub mmfar: u32,
    /// Bus fault address.
    pub bfar: u32,
}

impl fmt::Display for FaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CFSR: {:#010x} HFSR: {:#010x} DFSR: {:#010x} MMFAR: {:#010x} BFAR: {:#010x}",
            self.cfsr, self.hfsr, self.dfsr, self.mmfar, self.bfar
        )
    }
}

/// Access to the registers the fault dispatcher reads and clears.
pub trait ExceptionRegisters {
    /// Number of the active exception.
    fn ipsr(&self) -> u32;

    /// Process (unprivileged) stack pointer.
    fn psp(&self) -> usize;

    /// Bus fault address register.
    fn bus_fault_address(&self) -> usize;

    /// Bus fault status bits.
    fn bus_fault_status(&self) -> u8;

    /// Clear the given bus fault status bits (write one to clear).
    fn clear_bus_fault_status(&self, bits: u8);

    fn fault_status(&self) -> FaultStatus;

    /// Load a word from `address` with unprivileged access rights.
    ///
    /// ## Safety
    ///
    /// `address` must be a word in memory the process stack may address.
    /// The load happens from fault context.
    unsafe fn read_unprivileged_u32(&self, address: usize) -> u32;
}
