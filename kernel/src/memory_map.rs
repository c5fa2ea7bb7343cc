// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Chip memory map facts that the static ACL resolver consults.
//!
//! The chip crate describes its bit-band alias windows, the address range of
//! its peripheral bridge, and the short table of registers that unprivileged
//! code may always access. All ranges are half-open.

use crate::acl::AclPermissions;

/// A half-open address range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressRange {
    pub start: usize,
    pub end: usize,
}

impl AddressRange {
    pub const fn new(start: usize, end: usize) -> AddressRange {
        AddressRange { start, end }
    }

    pub const fn contains(&self, address: usize) -> bool {
        self.start <= address && address < self.end
    }

    pub const fn size(&self) -> usize {
        self.end - self.start
    }
}

/// A bit-band alias window.
///
/// Every 32-bit word in the alias window maps to one bit of the target
/// region: alias word `alias.start + byte_offset * 32 + bit * 4` addresses bit
/// `bit` of byte `target + byte_offset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitBandWindow {
    /// The alias window.
    pub alias: AddressRange,
    /// Start of the region whose bits are aliased.
    pub target: usize,
}

impl BitBandWindow {
    pub const fn contains(&self, address: usize) -> bool {
        self.alias.contains(address)
    }

    /// Physical byte address aliased by `alias_address`.
    pub const fn to_physical(&self, alias_address: usize) -> usize {
        self.target + ((alias_address - self.alias.start) >> 5)
    }
}

/// A register that unprivileged code may always access, bypassing the ACL
/// tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SafeRegister {
    pub address: usize,
    pub permissions: AclPermissions,
    /// Why the register cannot be protected by the ACL tables.
    pub reason: &'static str,
}

/// Memory map of a chip, as far as permission decisions are concerned.
#[derive(Clone, Copy, Debug)]
pub struct MemoryMap {
    /// Registers exempt from ACL lookup.
    pub safe_registers: &'static [SafeRegister],
    /// Bit-band alias of the peripheral region.
    pub peripheral_bitband: BitBandWindow,
    /// Bit-band alias of the SRAM region.
    pub sram_bitband: BitBandWindow,
    /// Addresses served by the peripheral bridge and its ACL table.
    pub peripheral_bridge: AddressRange,
}

impl MemoryMap {
    pub fn safe_register(&self, address: usize) -> Option<&SafeRegister> {
        self.safe_registers.iter().find(|r| r.address == address)
    }

    /// Translate a bit-band alias into the byte it aliases. Other addresses
    /// are returned unchanged.
    pub fn resolve_bitband(&self, address: usize) -> usize {
        if self.peripheral_bitband.contains(address) {
            self.peripheral_bitband.to_physical(address)
        } else if self.sram_bitband.contains(address) {
            self.sram_bitband.to_physical(address)
        } else {
            address
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::TEST_MEMORY_MAP;

    #[test]
    fn peripheral_alias_translates_to_byte() {
        let window = TEST_MEMORY_MAP.peripheral_bitband;
        // Bit 3 of byte 0x4004_8004.
        let alias = 0x4200_0000 + 0x4_8004 * 32 + 3 * 4;
        assert!(window.contains(alias));
        assert_eq!(window.to_physical(alias), 0x4004_8004);
        assert_eq!(TEST_MEMORY_MAP.resolve_bitband(alias), 0x4004_8004);
    }

    #[test]
    fn sram_alias_translates_to_byte() {
        // Bit 7 of byte 0x2000_0100.
        let alias = 0x2200_0000 + 0x100 * 32 + 7 * 4;
        assert_eq!(TEST_MEMORY_MAP.resolve_bitband(alias), 0x2000_0100);
    }

    #[test]
    fn window_edges() {
        let window = TEST_MEMORY_MAP.peripheral_bitband;
        assert!(window.contains(0x4200_0000));
        assert!(window.contains(0x43ff_ffff));
        assert!(!window.contains(0x4400_0000));
        assert!(!window.contains(0x41ff_ffff));
        assert_eq!(window.to_physical(0x43ff_fffc), 0x400f_ffff);
    }

    #[test]
    fn other_addresses_are_unchanged() {
        assert_eq!(TEST_MEMORY_MAP.resolve_bitband(0x4004_8000), 0x4004_8000);
        assert_eq!(TEST_MEMORY_MAP.resolve_bitband(0x1fff_0000), 0x1fff_0000);
    }
}
