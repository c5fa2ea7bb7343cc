// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Chip trait setup.

use cortexm::exceptions::CortexMExceptions;
use cortexm::scb::{Scb, SCB};
use vmpu::memory_map::MemoryMap;
use vmpu::platform::chip::Chip;

use crate::aips::{Aips, AIPS0, AIPS1};
use crate::memory_map::MEMORY_MAP;
use crate::sysmpu::{K64Mpu, SYSMPU_BASE};

pub struct K64f<const NUM_BOXES: usize> {
    mpu: K64Mpu,
    aips: Aips<NUM_BOXES>,
    exceptions: CortexMExceptions,
}

impl<const NUM_BOXES: usize> K64f<NUM_BOXES> {
    /// The chip at its documented register addresses.
    ///
    /// ## Safety
    ///
    /// Only one instance may exist, since it owns the SYSMPU, the bridge
    /// ACLs and the SCB fault registers.
    pub const unsafe fn new() -> Self {
        Self::with_peripherals(
            K64Mpu::new(SYSMPU_BASE),
            Aips::new(AIPS0, AIPS1),
            CortexMExceptions::new(Scb::new(SCB)),
        )
    }

    pub const fn with_peripherals(
        mpu: K64Mpu,
        aips: Aips<NUM_BOXES>,
        exceptions: CortexMExceptions,
    ) -> Self {
        K64f {
            mpu,
            aips,
            exceptions,
        }
    }

    /// Take MemManage, BusFault and UsageFault on their own vectors, so that
    /// MPU violations reach the bus fault path instead of HardFault.
    pub fn enable_fault_exceptions(&self) {
        self.exceptions.scb().enable_fault_exceptions();
    }
}

impl<const NUM_BOXES: usize> Chip for K64f<NUM_BOXES> {
    type MPU = K64Mpu;
    type PeripheralAcl = Aips<NUM_BOXES>;
    type Exceptions = CortexMExceptions;

    fn mpu(&self) -> &K64Mpu {
        &self.mpu
    }

    fn peripheral_acl(&self) -> &Aips<NUM_BOXES> {
        &self.aips
    }

    fn exceptions(&self) -> &CortexMExceptions {
        &self.exceptions
    }

    fn memory_map(&self) -> &MemoryMap {
        &MEMORY_MAP
    }
}
