// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Helper functions for the Cortex-M architecture.

/// WFI instruction
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub unsafe fn wfi() {
    use core::arch::asm;
    asm!("wfi", options(nomem, preserves_flags));
}

/// Mask all configurable interrupts (set PRIMASK).
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub unsafe fn disable_interrupts() {
    use core::arch::asm;
    asm!("cpsid i", options(nomem, nostack));
}

/// Read the IPSR, the number of the active exception.
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn ipsr() -> u32 {
    use core::arch::asm;
    let ipsr: u32;
    unsafe {
        asm!("mrs {}, ipsr", out(reg) ipsr, options(nomem, nostack, preserves_flags));
    }
    ipsr
}

/// Read the process stack pointer.
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub fn psp() -> usize {
    use core::arch::asm;
    let psp: usize;
    unsafe {
        asm!("mrs {}, psp", out(reg) psp, options(nomem, nostack, preserves_flags));
    }
    psp
}

/// Load a word with unprivileged access rights (`LDRT`).
///
/// ## Safety
///
/// The load may fault. It must only be issued where a fault is handled,
/// and `address` must be word aligned.
#[cfg(any(doc, all(target_arch = "arm", target_os = "none")))]
#[inline(always)]
pub unsafe fn ldrt(address: usize) -> u32 {
    use core::arch::asm;
    let value: u32;
    asm!(
        "ldrt {value}, [{address}]",
        value = out(reg) value,
        address = in(reg) address,
        options(readonly, nostack, preserves_flags)
    );
    value
}

// Mock implementations for tests on the host.

/// WFI instruction (mock)
#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub unsafe fn wfi() {
    unimplemented!()
}

#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub unsafe fn disable_interrupts() {
    unimplemented!()
}

#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn ipsr() -> u32 {
    unimplemented!()
}

#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub fn psp() -> usize {
    unimplemented!()
}

#[cfg(not(any(doc, all(target_arch = "arm", target_os = "none"))))]
pub unsafe fn ldrt(_address: usize) -> u32 {
    unimplemented!()
}
