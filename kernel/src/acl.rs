// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Access control list permissions and the static ACL resolver.

use crate::boxes::BoxId;
use crate::memory_map::MemoryMap;
use crate::platform::peripheral::PeripheralAcl;

bitflags::bitflags! {
    /// Permission mask attached to an ACL entry.
    ///
    /// The `U*` bits grant unprivileged access, the `S*` bits privileged
    /// access. The remaining bits describe how the entry is installed.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct AclPermissions: u32 {
        const UEXECUTE = 0x0001;
        const UWRITE = 0x0002;
        const UREAD = 0x0004;
        const SEXECUTE = 0x0008;
        const SWRITE = 0x0010;
        const SREAD = 0x0020;
        const SIZE_ROUND_UP = 0x0040;
        const SIZE_ROUND_DOWN = 0x0080;
        const PERIPHERAL = 0x0100;
        const SHARED = 0x0200;
        const USER = 0x0400;
        const IRQ = 0x0800;
        /// The region is a box stack.
        const STACK = 0x1000;

        const UACL = Self::UEXECUTE.bits() | Self::UWRITE.bits() | Self::UREAD.bits();
        const SACL = Self::SEXECUTE.bits() | Self::SWRITE.bits() | Self::SREAD.bits();
        const EXECUTE = Self::UEXECUTE.bits() | Self::SEXECUTE.bits();
        const WRITE = Self::UWRITE.bits() | Self::SWRITE.bits();
        const READ = Self::UREAD.bits() | Self::SREAD.bits();
        const ACCESS = Self::UACL.bits() | Self::SACL.bits();
    }
}

impl AclPermissions {
    /// Default permissions of a box data (bss) region.
    pub const DATA: AclPermissions = AclPermissions::UREAD
        .union(AclPermissions::UWRITE)
        .union(AclPermissions::SREAD)
        .union(AclPermissions::SWRITE)
        .union(AclPermissions::SIZE_ROUND_UP);

    /// Default permissions of a box stack region.
    pub const STACK_REGION: AclPermissions = AclPermissions::DATA.union(AclPermissions::STACK);

    /// Code shared by all boxes, such as flash.
    pub const CODE: AclPermissions = AclPermissions::UREAD
        .union(AclPermissions::UEXECUTE)
        .union(AclPermissions::SREAD)
        .union(AclPermissions::SEXECUTE);

    /// Default permissions of a peripheral granted to a box.
    pub const PERIPH: AclPermissions = AclPermissions::DATA.union(AclPermissions::PERIPHERAL);

    /// Whether this mask grants any access at all.
    pub fn grants_access(&self) -> bool {
        self.intersects(AclPermissions::ACCESS)
    }
}

/// Find the permissions `box_id` is statically entitled to at `address`.
///
/// Only the chip's safe registers and the peripheral bridge are covered. The
/// lookup is:
///
/// 1. A register in the safe register table is granted its listed access
///    without consulting any ACL table.
/// 2. A peripheral or SRAM bit-band alias is translated to the byte it
///    aliases.
/// 3. An address served by the peripheral bridge is looked up in the box's
///    peripheral ACLs for an access of `size` bytes.
///
/// Anything else yields the empty mask. Nothing is installed in hardware.
pub fn find_static_acl<P: PeripheralAcl + ?Sized>(
    memory_map: &MemoryMap,
    peripherals: &P,
    box_id: BoxId,
    address: usize,
    size: usize,
) -> AclPermissions {
    if let Some(register) = memory_map.safe_register(address) {
        return register.permissions;
    }

    let address = memory_map.resolve_bitband(address);

    if memory_map.peripheral_bridge.contains(address) {
        peripherals.find_acl(box_id, address, size)
    } else {
        AclPermissions::empty()
    }
}
