// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! System Memory Protection Unit (SYSMPU)
//!
//! The K64 does not use the ARMv7-M MPU. Its SYSMPU sits on the crossbar
//! slave ports and checks every bus master access against up to sixteen
//! region descriptors, granting an access if any valid descriptor allows it.
//! Violations are reported as bus faults, with the offending address and
//! attributes latched per slave port.
//!
//! Region descriptor 0 covers the whole address space and cannot be moved;
//! only its access rights can be changed, through `RGDAAC0`. It is used as the
//! background region: full access in supervisor mode, none in user mode.

use vmpu::acl::AclPermissions;
use vmpu::platform::mpu::{FaultSyndrome, Region, MPU};
use vmpu::utilities::registers::interfaces::{Readable, Writeable};
use vmpu::utilities::registers::{register_bitfields, register_structs, FieldValue, ReadOnly, ReadWrite};
use vmpu::utilities::StaticRef;

/// Number of crossbar slave ports with an error capture register pair.
pub const NUM_SLAVE_PORTS: usize = 5;

/// Region bounds are kept in bits 31:5 of the descriptor words.
pub const REGION_ALIGNMENT: usize = 32;

register_structs! {
    /// Error capture registers of one slave port.
    pub SlavePortError {
        /// Error Address Register
        (0x0 => pub ear: ReadOnly<u32>),
        /// Error Detail Register
        (0x4 => pub edr: ReadOnly<u32, ErrorDetail::Register>),
        (0x8 => @END),
    }
}

register_structs! {
    /// One region descriptor.
    pub RegionDescriptor {
        (0x0 => pub word0: ReadWrite<u32, RegionWord0::Register>),
        (0x4 => pub word1: ReadWrite<u32, RegionWord1::Register>),
        (0x8 => pub word2: ReadWrite<u32, AccessControl::Register>),
        (0xc => pub word3: ReadWrite<u32, RegionWord3::Register>),
        (0x10 => @END),
    }
}

register_structs! {
    pub SysMpuRegisters {
        /// Control/Error Status Register
        (0x000 => pub cesr: ReadWrite<u32, ControlErrorStatus::Register>),
        (0x004 => _reserved0),
        (0x010 => pub sp: [SlavePortError; NUM_SLAVE_PORTS]),
        (0x038 => _reserved1),
        /// Region Descriptors
        (0x400 => pub rgd: [RegionDescriptor; 12]),
        (0x4c0 => _reserved2),
        /// Region Descriptor Alternate Access Control
        (0x800 => pub rgdaac: [ReadWrite<u32, AccessControl::Register>; 12]),
        (0x830 => @END),
    }
}

register_bitfields![u32,
    pub ControlErrorStatus [
        /// Slave port n error, bit 31 for port 0. Write one to clear.
        SPERR OFFSET(27) NUMBITS(5) [],
        /// Hardware revision level
        HRL OFFSET(16) NUMBITS(4) [],
        /// Number of slave ports
        NSP OFFSET(12) NUMBITS(4) [],
        /// Number of region descriptors
        NRGD OFFSET(8) NUMBITS(4) [
            Eight = 0,
            Twelve = 1,
            Sixteen = 2
        ],
        /// Global enable
        VLD OFFSET(0) NUMBITS(1) []
    ],

    pub ErrorDetail [
        /// Error access control detail, one bit per region descriptor.
        EACD OFFSET(16) NUMBITS(16) [],
        /// Error process identification
        EPID OFFSET(8) NUMBITS(8) [],
        /// Error master number
        EMN OFFSET(4) NUMBITS(4) [],
        /// Error attributes
        EATTR OFFSET(1) NUMBITS(3) [],
        /// Error read/write
        ERW OFFSET(0) NUMBITS(1) [
            Read = 0,
            Write = 1
        ]
    ],

    pub RegionWord0 [
        SRTADDR OFFSET(5) NUMBITS(27) []
    ],

    pub RegionWord1 [
        /// Bits 4:0 of the end address read as ones.
        ENDADDR OFFSET(5) NUMBITS(27) []
    ],

    /// Per-master access rights. User mode rights are a read/write/execute
    /// triple in bits 2:0 of each `UM` field.
    pub AccessControl [
        M0UM OFFSET(0) NUMBITS(3) [],
        M0SM OFFSET(3) NUMBITS(2) [
            ReadWriteExecute = 0,
            ReadExecute = 1,
            ReadWrite = 2,
            SameAsUser = 3
        ],
        M0PE OFFSET(5) NUMBITS(1) [],
        M1UM OFFSET(6) NUMBITS(3) [],
        M1SM OFFSET(9) NUMBITS(2) [
            ReadWriteExecute = 0,
            ReadExecute = 1,
            ReadWrite = 2,
            SameAsUser = 3
        ],
        M1PE OFFSET(11) NUMBITS(1) [],
        M2UM OFFSET(12) NUMBITS(3) [],
        M2SM OFFSET(15) NUMBITS(2) [
            ReadWriteExecute = 0,
            ReadExecute = 1,
            ReadWrite = 2,
            SameAsUser = 3
        ],
        M3UM OFFSET(18) NUMBITS(3) [],
        M3SM OFFSET(21) NUMBITS(2) [
            ReadWriteExecute = 0,
            ReadExecute = 1,
            ReadWrite = 2,
            SameAsUser = 3
        ],
        M4WE OFFSET(24) NUMBITS(1) [],
        M4RE OFFSET(25) NUMBITS(1) [],
        M5WE OFFSET(26) NUMBITS(1) [],
        M5RE OFFSET(27) NUMBITS(1) [],
        M6WE OFFSET(28) NUMBITS(1) [],
        M6RE OFFSET(29) NUMBITS(1) [],
        M7WE OFFSET(30) NUMBITS(1) [],
        M7RE OFFSET(31) NUMBITS(1) []
    ],

    pub RegionWord3 [
        /// Process identifier
        PID OFFSET(24) NUMBITS(8) [],
        /// Process identifier mask
        PIDMASK OFFSET(16) NUMBITS(8) [],
        /// Region descriptor valid
        VLD OFFSET(0) NUMBITS(1) []
    ]
];

pub const SYSMPU_BASE: StaticRef<SysMpuRegisters> =
    unsafe { StaticRef::new(0x4000_D000 as *const SysMpuRegisters) };

/// Core (bus master 0) rights for a set of ACL permissions.
///
/// The user mode triple of the descriptor uses the same bit order as the
/// `U*` ACL bits. Supervisor rights the descriptor cannot express fall back
/// to the user rights.
pub fn access_control(permissions: AclPermissions) -> FieldValue<u32, AccessControl::Register> {
    let user = AccessControl::M0UM.val((permissions & AclPermissions::UACL).bits());
    let supervisor = match (
        permissions.contains(AclPermissions::SREAD),
        permissions.contains(AclPermissions::SWRITE),
        permissions.contains(AclPermissions::SEXECUTE),
    ) {
        (true, true, true) => AccessControl::M0SM::ReadWriteExecute,
        (true, false, true) => AccessControl::M0SM::ReadExecute,
        (true, true, false) => AccessControl::M0SM::ReadWrite,
        _ => AccessControl::M0SM::SameAsUser,
    };
    user + supervisor
}

pub struct K64Mpu {
    registers: StaticRef<SysMpuRegisters>,
}

impl K64Mpu {
    pub const fn new(registers: StaticRef<SysMpuRegisters>) -> K64Mpu {
        K64Mpu { registers }
    }
}

impl MPU for K64Mpu {
    fn number_total_regions(&self) -> usize {
        let descriptors: usize = match self.registers.cesr.read_as_enum(ControlErrorStatus::NRGD) {
            Some(ControlErrorStatus::NRGD::Value::Sixteen) => 16,
            Some(ControlErrorStatus::NRGD::Value::Twelve) => 12,
            _ => 8,
        };
        descriptors.min(self.registers.rgd.len())
    }

    fn region_alignment(&self) -> usize {
        REGION_ALIGNMENT
    }

    fn init_reserved_regions(&self) {
        // Masters 0 to 3 are the core, the debugger, DMA and Ethernet.
        self.registers.rgdaac[0].write(
            AccessControl::M0SM::ReadWriteExecute
                + AccessControl::M0UM.val(0)
                + AccessControl::M1SM::ReadWriteExecute
                + AccessControl::M1UM.val(0b111)
                + AccessControl::M2SM::ReadWriteExecute
                + AccessControl::M2UM.val(0)
                + AccessControl::M3SM::ReadWriteExecute
                + AccessControl::M3UM.val(0),
        );
    }

    fn write_region(&self, slot: usize, region: &Region) {
        if slot < self.number_reserved_regions() {
            return;
        }
        if let Some(rgd) = self.registers.rgd.get(slot) {
            // Writing words 0 to 2 clears the descriptor valid bit.
            rgd.word0
                .write(RegionWord0::SRTADDR.val(region.start() as u32 >> 5));
            rgd.word1
                .write(RegionWord1::ENDADDR.val((region.end() - 1) as u32 >> 5));
            rgd.word2.write(access_control(region.permissions()));
            rgd.word3.write(RegionWord3::VLD::SET);
        }
    }

    fn disable_region(&self, slot: usize) {
        if slot < self.number_reserved_regions() {
            return;
        }
        if let Some(rgd) = self.registers.rgd.get(slot) {
            rgd.word3.write(RegionWord3::VLD::CLEAR);
        }
    }

    fn fault_syndrome(&self) -> FaultSyndrome {
        let sperr = self.registers.cesr.read(ControlErrorStatus::SPERR);
        match sperr.count_ones() {
            0 => FaultSyndrome::None,
            1 => FaultSyndrome::SlavePort(NUM_SLAVE_PORTS - 1 - sperr.trailing_zeros() as usize),
            _ => FaultSyndrome::Multiple,
        }
    }

    fn fault_address(&self, port: usize) -> usize {
        self.registers.sp.get(port).map_or(0, |sp| sp.ear.get() as usize)
    }

    fn clear_fault(&self, port: usize) {
        if port >= NUM_SLAVE_PORTS {
            return;
        }
        // SPERR is write-one-to-clear; keep the global enable as it is.
        let enabled = self.registers.cesr.read(ControlErrorStatus::VLD);
        self.registers.cesr.write(
            ControlErrorStatus::SPERR.val(1 << (NUM_SLAVE_PORTS - 1 - port))
                + ControlErrorStatus::VLD.val(enabled),
        );
    }

    fn enable(&self) {
        self.registers.cesr.write(ControlErrorStatus::VLD::SET);
    }
}
