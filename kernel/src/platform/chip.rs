// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface for individual MCUs.

use crate::memory_map::MemoryMap;
use crate::platform::exceptions::ExceptionRegisters;
use crate::platform::mpu::MPU;
use crate::platform::peripheral::PeripheralAcl;

/// Interface for individual MCUs.
///
/// A chip bundles the hardware the engine drives: the MPU region table, the
/// peripheral bridge ACLs and the core exception registers.
pub trait Chip {
    type MPU: MPU;
    type PeripheralAcl: PeripheralAcl;
    type Exceptions: ExceptionRegisters;

    fn mpu(&self) -> &Self::MPU;
    fn peripheral_acl(&self) -> &Self::PeripheralAcl;
    fn exceptions(&self) -> &Self::Exceptions;

    /// Bit-band windows, peripheral bridge range and safe registers.
    fn memory_map(&self) -> &MemoryMap;
}

/// Entry point called by the architecture's exception trampoline.
pub trait SystemExceptionHandler {
    /// Handle the active system exception.
    ///
    /// `exc_return` is the link register value on exception entry and `msp`
    /// the main stack pointer at that time. Returns only if the exception was
    /// resolved; otherwise the system halts.
    fn handle_system_exception(&self, exc_return: usize, msp: usize);
}
