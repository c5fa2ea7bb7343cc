// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interfaces implemented by chips and architectures.

pub mod chip;
pub mod exceptions;
pub mod mpu;
pub mod peripheral;
