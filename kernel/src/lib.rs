// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Virtual MPU
//!
//! The vmpu crate isolates mutually distrusting boxes that share one core
//! and an MPU with only a handful of region slots. It lays out box memory at
//! bring-up, swaps the protection state on every box switch, and repairs the
//! region table from the fault handler when a box touches a page it owns
//! that is not currently mapped. Unauthorized accesses halt the device.
//!
//! Hardware access goes through the traits in [`platform`], implemented by
//! the architecture and chip crates, so the engine itself runs on a host.

#![warn(unreachable_pub)]
#![no_std]

#[cfg(test)]
#[macro_use]
extern crate std;

#[macro_use]
pub mod debug;

pub mod acl;
pub mod boxes;
pub mod errorcode;
pub mod fault;
pub mod halt;
pub mod layout;
pub mod memory_map;
pub mod page;
pub mod platform;
pub mod region_table;
pub mod utilities;
pub mod vmpu;

mod config;

#[cfg(test)]
mod testing;

pub use crate::acl::AclPermissions;
pub use crate::boxes::BoxId;
pub use crate::errorcode::ErrorCode;
pub use crate::vmpu::{Collaborators, PrivilegedHooks, Vmpu};
