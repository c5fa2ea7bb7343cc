// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Halting the core after an unrecoverable error.

use core::fmt::{self, Write};

use vmpu::debug::{with_debug_writer, write_line, DebugLineWriter, IoWrite};
use vmpu::fault::FaultContext;
use vmpu::halt::{fault_reports_enabled, write_report, Halt, HaltError};

use crate::fault_status::CortexMFaultStatus;
use crate::support;

/// Reports to the debug writer, masks interrupts and sleeps forever.
pub struct CortexMHalt;

impl CortexMHalt {
    pub const fn new() -> CortexMHalt {
        CortexMHalt
    }
}

/// Write the full halt report for an exception with IPSR value `ipsr`.
pub fn write_halt_report(
    w: &mut dyn Write,
    ipsr: u32,
    error: HaltError,
    context: Option<&FaultContext>,
    message: fmt::Arguments,
) -> fmt::Result {
    write_report(w, error, context, message)?;
    if fault_reports_enabled() {
        write!(
            w,
            "Active exception: {} ({})\r\n",
            crate::ipsr_isr_number_to_str(ipsr as usize),
            ipsr
        )?;
        if let Some(context) = context {
            write!(w, "{}", CortexMFaultStatus(context.status))?;
        }
    }
    Ok(())
}

/// Write the halt report to `writer`. If the writer cannot take all of it,
/// a one-line notice follows the part that was written.
pub fn report_halt(
    writer: &dyn IoWrite,
    ipsr: u32,
    error: HaltError,
    context: Option<&FaultContext>,
    message: fmt::Arguments,
) {
    let mut w = DebugLineWriter::new(writer);
    if write_halt_report(&mut w, ipsr, error, context, message).is_err() {
        write_line(
            writer,
            format_args!("\r\nHALT_ERROR({}): halt report truncated", error),
            None,
        );
    }
}

impl Halt for CortexMHalt {
    fn halt(&self, error: HaltError, context: Option<&FaultContext>, message: fmt::Arguments) -> ! {
        unsafe {
            support::disable_interrupts();
        }
        let ipsr = support::ipsr() & 0x1ff;
        with_debug_writer(|writer| report_halt(writer, ipsr, error, context, message));
        loop {
            unsafe {
                support::wfi();
            }
        }
    }
}
