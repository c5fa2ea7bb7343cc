// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Data structure for storing compile-time configuration options in the
//! monitor.
//!
//! Configuration is held in a typed `const` object rather than scattered
//! `#[cfg]` attributes, so every code path is type-checked even when an option
//! is disabled, and the compiler folds the disabled paths away afterwards.

/// Data structure holding compile-time configuration options.
///
/// To change the configuration, enable the matching cargo feature of the
/// `vmpu` crate.
pub(crate) struct Config {
    /// Whether the vMPU should trace its decisions to the debug output.
    ///
    /// If enabled, the monitor prints a line for every recovered page fault,
    /// every box laid out in the shared arena, and every fault that reported
    /// multiple simultaneous MPU violations.
    pub(crate) debug_vmpu: bool,

    /// Whether halt reports should include the decoded fault context.
    ///
    /// Disabling the reports removes the formatting code for the fault context
    /// from the binary. The halt category and message are always reported.
    pub(crate) fault_reports: bool,
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined. This is the only location in the crate where `cfg!(feature)` is
/// consulted.
pub(crate) const CONFIG: Config = Config {
    debug_vmpu: cfg!(feature = "debug_vmpu"),
    fault_reports: !cfg!(feature = "no_fault_reports"),
};
