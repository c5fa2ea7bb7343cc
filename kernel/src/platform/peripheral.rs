// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface for peripheral-bridge access control.

use crate::acl::AclPermissions;
use crate::boxes::BoxId;
use crate::ErrorCode;

/// Per-box access control for memory-mapped peripherals.
///
/// Peripheral access is not enforced through MPU regions but through the
/// bridge in front of the peripherals, which marks each peripheral slot as
/// accessible from unprivileged code or not.
pub trait PeripheralAcl {
    /// Grant `box_id` access to the peripherals in `[start, start + size)`.
    fn add_acl(
        &self,
        box_id: BoxId,
        start: usize,
        size: usize,
        permissions: AclPermissions,
    ) -> Result<(), ErrorCode>;

    /// Permissions `box_id` holds for an access of `size` bytes at `address`.
    ///
    /// Returns the empty mask if the access is not covered by one of the
    /// box's peripheral ACLs.
    fn find_acl(&self, box_id: BoxId, address: usize, size: usize) -> AclPermissions;

    /// Replace the live peripheral ACLs of `src` by those of `dst`.
    fn switch(&self, src: BoxId, dst: BoxId);
}
