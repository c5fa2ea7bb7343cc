// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! ARM System Control Block
//!
//! <http://infocenter.arm.com/help/index.jsp?topic=/com.arm.doc.dui0553a/CIHFDJCA.html>

use vmpu::platform::exceptions::FaultStatus;
use vmpu::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use vmpu::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use vmpu::utilities::StaticRef;

register_structs! {
    /// In an ARMv7-M processor, a System Control Block (SCB) in the SCS
    /// provides key status information and control features for the processor.
    pub ScbRegisters {
        /// CPUID, ICSR, VTOR and AIRCR.
        (0x00 => _reserved0),

        /// System Control Register
        (0x10 => pub scr: ReadWrite<u32, SystemControl::Register>),

        /// CCR and the system handler priority registers.
        (0x14 => _reserved1),

        /// System Handler Control and State Register
        (0x24 => pub shcsr: ReadWrite<u32, SystemHandlerControlAndState::Register>),

        /// Configurable Fault Status Register
        (0x28 => pub cfsr: ReadWrite<u32, ConfigurableFaultStatus::Register>),

        /// HardFault Status Register
        (0x2c => pub hfsr: ReadWrite<u32, HardFaultStatus::Register>),

        /// Debug Fault Status Register
        (0x30 => pub dfsr: ReadWrite<u32>),

        /// MemManage Fault Address Register
        (0x34 => pub mmfar: ReadWrite<u32>),

        /// BusFault Address Register
        (0x38 => pub bfar: ReadWrite<u32>),

        /// Auxiliary Fault Status Register
        (0x3c => _reserved2),

        (0x40 => @END),
    }
}

register_bitfields![u32,
    pub SystemControl [
        SEVONPEND       OFFSET(4)   NUMBITS(1),
        SLEEPDEEP       OFFSET(2)   NUMBITS(1),
        SLEEPONEXIT     OFFSET(1)   NUMBITS(1)
    ],

    pub SystemHandlerControlAndState [
        USGFAULTENA     OFFSET(18)  NUMBITS(1),
        BUSFAULTENA     OFFSET(17)  NUMBITS(1),
        MEMFAULTENA     OFFSET(16)  NUMBITS(1),
        SVCALLPENDED    OFFSET(15)  NUMBITS(1),
        BUSFAULTPENDED  OFFSET(14)  NUMBITS(1),
        MEMFAULTPENDED  OFFSET(13)  NUMBITS(1),
        USGFAULTPENDED  OFFSET(12)  NUMBITS(1),
        SYSTICKACT      OFFSET(11)  NUMBITS(1),
        PENDSVACT       OFFSET(10)  NUMBITS(1),
        MONITORACT      OFFSET(8)   NUMBITS(1),
        SVCALLACT       OFFSET(7)   NUMBITS(1),
        USGFAULTACT     OFFSET(3)   NUMBITS(1),
        BUSFAULTACT     OFFSET(1)   NUMBITS(1),
        MEMFAULTACT     OFFSET(0)   NUMBITS(1)
    ],

    /// CFSR: MMFSR in bits [7:0], BFSR in bits [15:8], UFSR in bits [31:16].
    /// All status bits are write-one-to-clear.
    pub ConfigurableFaultStatus [
        UsageFault      OFFSET(16)  NUMBITS(16),
        BusFault        OFFSET(8)   NUMBITS(8),
        MemManage       OFFSET(0)   NUMBITS(8),

        DIVBYZERO       OFFSET(25)  NUMBITS(1),
        UNALIGNED       OFFSET(24)  NUMBITS(1),
        NOCP            OFFSET(19)  NUMBITS(1),
        INVPC           OFFSET(18)  NUMBITS(1),
        INVSTATE        OFFSET(17)  NUMBITS(1),
        UNDEFINSTR      OFFSET(16)  NUMBITS(1),

        BFARVALID       OFFSET(15)  NUMBITS(1),
        LSPERR          OFFSET(13)  NUMBITS(1),
        STKERR          OFFSET(12)  NUMBITS(1),
        UNSTKERR        OFFSET(11)  NUMBITS(1),
        IMPRECISERR     OFFSET(10)  NUMBITS(1),
        PRECISERR       OFFSET(9)   NUMBITS(1),
        IBUSERR         OFFSET(8)   NUMBITS(1),

        MMARVALID       OFFSET(7)   NUMBITS(1),
        MLSPERR         OFFSET(5)   NUMBITS(1),
        MSTKERR         OFFSET(4)   NUMBITS(1),
        MUNSTKERR       OFFSET(3)   NUMBITS(1),
        DACCVIOL        OFFSET(1)   NUMBITS(1),
        IACCVIOL        OFFSET(0)   NUMBITS(1)
    ],

    pub HardFaultStatus [
        DEBUGEVT        OFFSET(31)  NUMBITS(1),
        FORCED          OFFSET(30)  NUMBITS(1),
        VECTTBL         OFFSET(1)   NUMBITS(1)
    ]
];

/// Base address of the SCB.
pub const SCB_BASE: usize = 0xE000_ED00;

/// Address of the System Control Register.
pub const SCB_SCR: usize = SCB_BASE + 0x10;

pub const SCB: StaticRef<ScbRegisters> =
    unsafe { StaticRef::new(SCB_BASE as *const ScbRegisters) };

/// Access to the fault-related SCB registers.
pub struct Scb {
    registers: StaticRef<ScbRegisters>,
}

impl Scb {
    pub const fn new(registers: StaticRef<ScbRegisters>) -> Scb {
        Scb { registers }
    }

    /// Route MemManage, BusFault and UsageFault to their own handlers
    /// instead of escalating them to HardFault.
    pub fn enable_fault_exceptions(&self) {
        self.registers.shcsr.modify(
            SystemHandlerControlAndState::MEMFAULTENA::SET
                + SystemHandlerControlAndState::BUSFAULTENA::SET
                + SystemHandlerControlAndState::USGFAULTENA::SET,
        );
    }

    pub fn bus_fault_address(&self) -> u32 {
        self.registers.bfar.get()
    }

    /// The BFSR byte of CFSR.
    pub fn bus_fault_status(&self) -> u8 {
        self.registers.cfsr.read(ConfigurableFaultStatus::BusFault) as u8
    }

    /// Clear the given BFSR bits. The other CFSR bits are left alone since
    /// they are write-one-to-clear.
    pub fn clear_bus_fault_status(&self, bits: u8) {
        self.registers
            .cfsr
            .write(ConfigurableFaultStatus::BusFault.val(u32::from(bits)));
    }

    pub fn fault_status(&self) -> FaultStatus {
        FaultStatus {
            cfsr: self.registers.cfsr.get(),
            hfsr: self.registers.hfsr.get(),
            dfsr: self.registers.dfsr.get(),
            mmfar: self.registers.mmfar.get(),
            bfar: self.registers.bfar.get(),
        }
    }
}
