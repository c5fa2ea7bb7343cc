// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Support for debug output from the monitor.
//!
//! The board registers a writer for raw bytes (a UART, ITM stimulus port or
//! semihosting channel) with [`set_debug_writer`]. Afterwards the `debug!`
//! macro formats lines into that writer:
//!
//! ```ignore
//! debug!("box {} laid out at {:#010x}", box_id, base);
//! ```
//!
//! Output produced before a writer is registered is dropped. Nothing here
//! blocks, so the macros may be used from fault context.

use core::fmt::{self, Arguments, Write};
use core::ptr::addr_of;

use crate::utilities::cells::OptionalCell;

/// Byte sink used for debug output.
///
/// Implementations must not block and must not fault; they run inside the
/// fault dispatcher.
pub trait IoWrite {
    /// Write `buf` and return how many bytes were accepted.
    fn write(&self, buf: &[u8]) -> usize;
}

static mut DEBUG_WRITER: OptionalCell<&'static dyn IoWrite> = OptionalCell::empty();

fn debug_writer() -> &'static OptionalCell<&'static dyn IoWrite> {
    // SAFETY: single core; the slot is written at bring-up and afterwards
    // only read from serialized exception handlers.
    unsafe { &*addr_of!(DEBUG_WRITER) }
}

/// Register the writer used by `debug!` and halt reports.
///
/// ## Safety
///
/// Must be called during single-threaded bring-up, before any exception that
/// may produce debug output is enabled.
pub unsafe fn set_debug_writer(writer: &'static dyn IoWrite) {
    debug_writer().set(writer);
}

/// Adapter from `core::fmt::Write` to an [`IoWrite`].
pub struct DebugLineWriter<'a> {
    writer: &'a dyn IoWrite,
}

impl<'a> DebugLineWriter<'a> {
    pub fn new(writer: &'a dyn IoWrite) -> Self {
        DebugLineWriter { writer }
    }
}

impl Write for DebugLineWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        if self.writer.write(bytes) < bytes.len() {
            Err(fmt::Error)
        } else {
            Ok(())
        }
    }
}

/// Format one line into `writer`, optionally prefixed by a source location.
pub fn write_line(writer: &dyn IoWrite, args: Arguments, file_line: Option<&(&str, u32)>) {
    let mut w = DebugLineWriter::new(writer);
    if let Some((file, line)) = file_line {
        let _ = w.write_fmt(format_args!("VMPU_DEBUG: {}:{}: ", file, line));
    }
    let _ = w.write_fmt(args);
    let _ = w.write_str("\r\n");
}

/// Run `f` with the registered writer, if any.
pub fn with_debug_writer<F: FnOnce(&dyn IoWrite)>(f: F) {
    if let Some(writer) = debug_writer().get() {
        f(writer);
    }
}

pub fn debug_println(args: Arguments) {
    with_debug_writer(|writer| write_line(writer, args, None));
}

pub fn debug_verbose_println(args: Arguments, file_line: &(&'static str, u32)) {
    with_debug_writer(|writer| write_line(writer, args, Some(file_line)));
}

/// In-kernel `println()` debugging.
#[macro_export]
macro_rules! debug {
    () => ({
        // Allow an empty debug!() to print the location when hit
        $crate::debug!("")
    });
    ($msg:expr $(,)?) => ({
        $crate::debug::debug_println(format_args!($msg));
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::debug_println(format_args!($fmt, $($arg)+));
    });
}

/// In-kernel `println()` debugging with filename and line numbers.
#[macro_export]
macro_rules! debug_verbose {
    () => ({
        $crate::debug_verbose!("")
    });
    ($msg:expr $(,)?) => ({
        $crate::debug::debug_verbose_println(format_args!($msg), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::debug_verbose_println(format_args!($fmt, $($arg)+), {
            static _FILE_LINE: (&'static str, u32) = (file!(), line!());
            &_FILE_LINE
        })
    });
}

/// Engine tracing, compiled in only with the `debug_vmpu` feature.
macro_rules! vmpu_debug {
    ($($arg:tt)+) => ({
        if $crate::config::CONFIG.debug_vmpu {
            $crate::debug_verbose!($($arg)+);
        }
    });
}
