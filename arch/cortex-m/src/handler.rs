// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Shared entry point for the system exceptions.
//!
//! The board points the MemManage, BusFault, UsageFault, HardFault,
//! DebugMonitor, PendSV and SysTick vectors at [`vmpu_sys_mux_handler`] and
//! registers the engine with [`set_system_exception_handler`]. The trampoline
//! captures `EXC_RETURN` and the main stack pointer before any Rust code
//! touches the stack, then calls the registered handler.

use core::ptr::addr_of;

use vmpu::platform::chip::SystemExceptionHandler;
use vmpu::utilities::cells::OptionalCell;

static mut SYSTEM_EXCEPTION_HANDLER: OptionalCell<&'static dyn SystemExceptionHandler> =
    OptionalCell::empty();

fn handler_slot() -> &'static OptionalCell<&'static dyn SystemExceptionHandler> {
    // SAFETY: written once during bring-up, read only from exception context
    // afterwards.
    unsafe { &*addr_of!(SYSTEM_EXCEPTION_HANDLER) }
}

/// Register the handler called for every system exception.
///
/// ## Safety
///
/// Must be called before the system exceptions are enabled, while nothing
/// else may read the slot.
pub unsafe fn set_system_exception_handler(handler: &'static dyn SystemExceptionHandler) {
    handler_slot().set(handler);
}

/// Rust side of the trampoline.
///
/// A system exception taken before the handler was registered cannot be
/// attributed to any box, so it panics.
#[no_mangle]
pub extern "C" fn vmpu_sys_mux_entry(exc_return: usize, msp: usize) {
    match handler_slot().get() {
        Some(handler) => handler.handle_system_exception(exc_return, msp),
        None => panic!(
            "system exception (EXC_RETURN {:#010x}) before a handler was registered",
            exc_return
        ),
    }
}

#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
extern "C" {
    /// Vector table entry for the system exceptions.
    ///
    /// Passes `EXC_RETURN` in r0 and the main stack pointer in r1 to
    /// [`vmpu_sys_mux_entry`] and returns from the exception when the
    /// handler returns.
    pub fn vmpu_sys_mux_handler();
}

#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
core::arch::global_asm!(
    "
    .section .vmpu_sys_mux_handler, \"ax\"
    .global vmpu_sys_mux_handler
    .thumb_func
  vmpu_sys_mux_handler:
    mov r0, lr                        // r0 = EXC_RETURN
    mrs r1, msp                       // r1 = MSP at exception entry
    push {{r0, lr}}                   // keep the stack 8-byte aligned
    bl {entry}
    pop {{r0, lr}}
    bx lr
    ",
    entry = sym vmpu_sys_mux_entry,
);

// Mock implementation for tests on the host.

#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub unsafe extern "C" fn vmpu_sys_mux_handler() {
    unimplemented!()
}
