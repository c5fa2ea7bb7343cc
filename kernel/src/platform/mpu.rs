// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface for configuring the Memory Protection Unit.

use core::fmt::{self, Display};

use crate::acl::AclPermissions;

/// A region of memory to be installed in one hardware slot.
///
/// `start` and `size` are multiples of the MPU's region alignment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    start: usize,
    size: usize,
    permissions: AclPermissions,
}

impl Region {
    pub const fn new(start: usize, size: usize, permissions: AclPermissions) -> Region {
        Region {
            start,
            size,
            permissions,
        }
    }

    pub const fn start(&self) -> usize {
        self.start
    }

    pub const fn size(&self) -> usize {
        self.size
    }

    /// First address past the region.
    pub const fn end(&self) -> usize {
        self.start + self.size
    }

    pub const fn permissions(&self) -> AclPermissions {
        self.permissions
    }

    pub const fn contains(&self, address: usize) -> bool {
        self.start <= address && address < self.end()
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:#010x}, {:#010x}) {:#06x}",
            self.start,
            self.end(),
            self.permissions.bits()
        )
    }
}

/// Source of an MPU access violation as reported by the MPU.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaultSyndrome {
    /// The MPU did not report a violation.
    None,
    /// A single violation was detected on the given slave port.
    SlavePort(usize),
    /// More than one slave port reported a violation.
    Multiple,
}

/// The generic trait that particular memory protection unit implementations
/// need to implement.
///
/// Slots `0..number_reserved_regions()` belong to the monitor and are never
/// touched through `write_region` or `disable_region`.
pub trait MPU {
    /// Total number of region slots.
    fn number_total_regions(&self) -> usize;

    /// Number of leading slots the monitor keeps for itself.
    fn number_reserved_regions(&self) -> usize {
        1
    }

    /// Granularity of region start and end addresses.
    fn region_alignment(&self) -> usize;

    /// Program the reserved slots.
    fn init_reserved_regions(&self);

    /// Install `region` in `slot` and mark the slot valid.
    fn write_region(&self, slot: usize, region: &Region);

    fn disable_region(&self, slot: usize);

    /// Which slave port, if any, reported a violation.
    fn fault_syndrome(&self) -> FaultSyndrome;

    /// Address of the last violation reported on `port`.
    fn fault_address(&self, port: usize) -> usize;

    /// Acknowledge the violation reported on `port`.
    fn clear_fault(&self, port: usize);

    /// Enable the MPU.
    fn enable(&self);
}
