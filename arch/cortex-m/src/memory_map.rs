// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Architecture-defined parts of the ARMv7-M memory map.

use vmpu::acl::AclPermissions;
use vmpu::memory_map::{AddressRange, BitBandWindow, SafeRegister};

use crate::scb::SCB_SCR;

/// Bit-band alias of the peripheral region `0x4000_0000..0x4010_0000`.
pub const PERIPHERAL_BITBAND: BitBandWindow = BitBandWindow {
    alias: AddressRange::new(0x4200_0000, 0x4400_0000),
    target: 0x4000_0000,
};

/// Bit-band alias of the SRAM region `0x2000_0000..0x2010_0000`.
pub const SRAM_BITBAND: BitBandWindow = BitBandWindow {
    alias: AddressRange::new(0x2200_0000, 0x2400_0000),
    target: 0x2000_0000,
};

/// Core registers that boxes may touch directly.
pub const SAFE_REGISTERS: &[SafeRegister] = &[SafeRegister {
    address: SCB_SCR,
    permissions: AclPermissions::UREAD.union(AclPermissions::UWRITE),
    reason: "SCB->SCR is written by sleep routines in box code",
}];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_alias_one_megabyte() {
        assert_eq!(PERIPHERAL_BITBAND.alias.size() >> 5, 0x10_0000);
        assert_eq!(SRAM_BITBAND.alias.size() >> 5, 0x10_0000);
        assert_eq!(PERIPHERAL_BITBAND.to_physical(0x43ff_fffc), 0x400f_ffff);
    }

    #[test]
    fn scr_is_user_accessible() {
        assert_eq!(SAFE_REGISTERS[0].address, 0xe000_ed10);
        assert!(SAFE_REGISTERS[0]
            .permissions
            .contains(AclPermissions::UREAD | AclPermissions::UWRITE));
    }
}
