// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! ARMv7-M implementation of the exception register interface.

use vmpu::platform::exceptions::{ExceptionRegisters, FaultStatus};

use crate::scb::Scb;
use crate::support;

pub struct CortexMExceptions {
    scb: Scb,
}

impl CortexMExceptions {
    pub const fn new(scb: Scb) -> CortexMExceptions {
        CortexMExceptions { scb }
    }

    pub fn scb(&self) -> &Scb {
        &self.scb
    }
}

impl ExceptionRegisters for CortexMExceptions {
    fn ipsr(&self) -> u32 {
        support::ipsr() & 0x1ff
    }

    fn psp(&self) -> usize {
        support::psp()
    }

    fn bus_fault_address(&self) -> usize {
        self.scb.bus_fault_address() as usize
    }

    fn bus_fault_status(&self) -> u8 {
        self.scb.bus_fault_status()
    }

    fn clear_bus_fault_status(&self, bits: u8) {
        self.scb.clear_bus_fault_status(bits);
    }

    fn fault_status(&self) -> FaultStatus {
        self.scb.fault_status()
    }

    unsafe fn read_unprivileged_u32(&self, address: usize) -> u32 {
        support::ldrt(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scb::tests::scb_in_memory;
    use vmpu::utilities::registers::interfaces::{Readable, Writeable};

    #[test]
    fn bus_fault_registers_come_from_the_scb() {
        let registers = scb_in_memory();
        registers.cfsr.set(0x0000_8200);
        registers.bfar.set(0x4006_a004);
        let exceptions = CortexMExceptions::new(Scb::new(registers));

        assert_eq!(exceptions.bus_fault_status(), 0x82);
        assert_eq!(exceptions.bus_fault_address(), 0x4006_a004);
        assert_eq!(exceptions.fault_status().cfsr, 0x8200);

        exceptions.clear_bus_fault_status(0x82);
        assert_eq!(registers.cfsr.get(), 0x8200);
    }
}
