// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Terminal error reporting.
//!
//! Conditions that leave the protection state untrustworthy are never
//! returned to a caller. They are handed to a [`Halt`] implementation which
//! reports them and stops the device.

use core::fmt;

use crate::fault::FaultContext;

/// Category of a halt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HaltError {
    /// An access was not covered by any ACL.
    PermissionDenied,
    /// A configuration check failed.
    SanityCheckFailed,
    NotImplemented,
    /// The operation is not allowed in the current state.
    NotAllowed,
    /// A fixed-size resource ran out.
    OutOfMemory,
    FaultMemManage,
    FaultBus,
    FaultUsage,
    FaultHard,
    FaultDebug,
}

impl fmt::Display for HaltError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HaltError::PermissionDenied => "PERMISSION_DENIED",
            HaltError::SanityCheckFailed => "SANITY_CHECK_FAILED",
            HaltError::NotImplemented => "NOT_IMPLEMENTED",
            HaltError::NotAllowed => "NOT_ALLOWED",
            HaltError::OutOfMemory => "OUT_OF_MEMORY",
            HaltError::FaultMemManage => "FAULT_MEMMANAGE",
            HaltError::FaultBus => "FAULT_BUS",
            HaltError::FaultUsage => "FAULT_USAGE",
            HaltError::FaultHard => "FAULT_HARD",
            HaltError::FaultDebug => "FAULT_DEBUG",
        };
        f.write_str(s)
    }
}

/// Fatal-halt reporter.
pub trait Halt {
    /// Report `error` with `message` and, for faults, the fault context,
    /// then stop. Never returns.
    fn halt(&self, error: HaltError, context: Option<&FaultContext>, message: fmt::Arguments) -> !;
}

/// Whether halt reports carry fault details beyond the category and message.
pub fn fault_reports_enabled() -> bool {
    crate::config::CONFIG.fault_reports
}

/// Format the report `halt` implementations print.
pub fn write_report(
    w: &mut dyn fmt::Write,
    error: HaltError,
    context: Option<&FaultContext>,
    message: fmt::Arguments,
) -> fmt::Result {
    writeln!(w, "\r\nHALT_ERROR({}): {}\r", error, message)?;
    if fault_reports_enabled() {
        if let Some(context) = context {
            writeln!(w, "{}\r", context)?;
        }
    }
    Ok(())
}
