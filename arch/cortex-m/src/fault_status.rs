// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Decoded fault status for halt reports.

use core::fmt;

use vmpu::platform::exceptions::FaultStatus;
use vmpu::utilities::registers::{Field, LocalRegisterCopy};

use crate::scb::{ConfigurableFaultStatus, HardFaultStatus};

type Cfsr = ConfigurableFaultStatus::Register;

const CFSR_BITS: [(Field<u32, Cfsr>, &str); 19] = [
    (ConfigurableFaultStatus::IACCVIOL, "Instruction Access Violation"),
    (ConfigurableFaultStatus::DACCVIOL, "Data Access Violation"),
    (ConfigurableFaultStatus::MUNSTKERR, "Memory Management Unstacking Fault"),
    (ConfigurableFaultStatus::MSTKERR, "Memory Management Stacking Fault"),
    (ConfigurableFaultStatus::MLSPERR, "Memory Management Lazy FP Fault"),
    (ConfigurableFaultStatus::IBUSERR, "Instruction Bus Error"),
    (ConfigurableFaultStatus::PRECISERR, "Precise Data Bus Error"),
    (ConfigurableFaultStatus::IMPRECISERR, "Imprecise Data Bus Error"),
    (ConfigurableFaultStatus::UNSTKERR, "Bus Unstacking Fault"),
    (ConfigurableFaultStatus::STKERR, "Bus Stacking Fault"),
    (ConfigurableFaultStatus::LSPERR, "Bus Lazy FP Fault"),
    (ConfigurableFaultStatus::UNDEFINSTR, "Undefined Instruction Usage Fault"),
    (ConfigurableFaultStatus::INVSTATE, "Invalid State Usage Fault"),
    (ConfigurableFaultStatus::INVPC, "Invalid PC Load Usage Fault"),
    (ConfigurableFaultStatus::NOCP, "No Coprocessor Usage Fault"),
    (ConfigurableFaultStatus::UNALIGNED, "Unaligned Access Usage Fault"),
    (ConfigurableFaultStatus::DIVBYZERO, "Divide By Zero"),
    (ConfigurableFaultStatus::MMARVALID, "Faulting Memory Address Valid"),
    (ConfigurableFaultStatus::BFARVALID, "Bus Fault Address Valid"),
];

/// A [`FaultStatus`] snapshot, displayed bit by bit.
pub struct CortexMFaultStatus(pub FaultStatus);

impl fmt::Display for CortexMFaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = &self.0;
        let cfsr = LocalRegisterCopy::<u32, Cfsr>::new(status.cfsr);
        let hfsr = LocalRegisterCopy::<u32, HardFaultStatus::Register>::new(status.hfsr);

        write!(f, "\r\n---| Fault Status |---\r\n")?;

        for (field, name) in CFSR_BITS.iter() {
            if cfsr.is_set(*field) {
                write!(f, "{:<36}true\r\n", name)?;
            }
        }
        if hfsr.is_set(HardFaultStatus::VECTTBL) {
            write!(f, "{:<36}true\r\n", "Bus Fault on Vector Table Read")?;
        }
        if hfsr.is_set(HardFaultStatus::FORCED) {
            write!(f, "{:<36}true\r\n", "Forced Hard Fault")?;
        }

        if cfsr.is_set(ConfigurableFaultStatus::MMARVALID) {
            write!(f, "Faulting Memory Address:            {:#010X}\r\n", status.mmfar)?;
        }
        if cfsr.is_set(ConfigurableFaultStatus::BFARVALID) {
            write!(f, "Bus Fault Address:                  {:#010X}\r\n", status.bfar)?;
        }

        if status.cfsr == 0 && status.hfsr == 0 {
            write!(f, "No faults detected.\r\n")
        } else {
            write!(f, "Fault Status Register (CFSR):       {:#010X}\r\n", status.cfsr)?;
            write!(f, "Hard Fault Status Register (HFSR):  {:#010X}\r\n", status.hfsr)
        }
    }
}
