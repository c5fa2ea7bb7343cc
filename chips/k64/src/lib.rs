// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Virtual MPU support for the Freescale (NXP) Kinetis K64.
//!
//! K64 Sub-Family Reference Manual: <https://www.nxp.com/docs/en/reference-manual/K64P144M120SF5RM.pdf>

#![no_std]

#[cfg(test)]
extern crate std;

pub mod aips;
pub mod chip;
pub mod memory_map;
pub mod sysmpu;

pub use crate::chip::K64f;
