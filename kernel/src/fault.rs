// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! The fault dispatcher.
//!
//! Every system exception is routed to [`Vmpu::sys_mux_handler`]. Bus faults
//! raised by unprivileged code are the only recoverable class: on this
//! architecture an MPU violation surfaces as a bus fault, so an access to a
//! page the box owns but which is not currently mapped can be repaired by
//! mapping the page and returning. Everything else halts.

use core::fmt;

use crate::halt::HaltError;
use crate::page;
use crate::platform::chip::{Chip, SystemExceptionHandler};
use crate::platform::exceptions::{ExceptionRegisters, FaultStatus};
use crate::platform::mpu::{FaultSyndrome, MPU};
use crate::vmpu::Vmpu;

/// Offset of the stacked PC in the exception frame.
const STACKED_PC_OFFSET: usize = 6 * 4;

/// The system exceptions the dispatcher knows about, by IRQ number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemException {
    HardFault,
    MemoryManagement,
    BusFault,
    UsageFault,
    DebugMonitor,
    PendSV,
    SysTick,
    /// Any other exception or interrupt, with its IRQ number.
    Other(i32),
}

impl SystemException {
    /// Decode the active exception from an IPSR value.
    ///
    /// IPSR numbers exceptions from 0; IRQ numbers are negative for system
    /// exceptions, hence the offset of 16.
    pub fn from_ipsr(ipsr: u32) -> SystemException {
        match (ipsr & 0x1ff) as i32 - 16 {
            -13 => SystemException::HardFault,
            -12 => SystemException::MemoryManagement,
            -11 => SystemException::BusFault,
            -10 => SystemException::UsageFault,
            -4 => SystemException::DebugMonitor,
            -2 => SystemException::PendSV,
            -1 => SystemException::SysTick,
            irqn => SystemException::Other(irqn),
        }
    }
}

/// The `EXC_RETURN` value found in the link register on exception entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExcReturn(pub usize);

impl ExcReturn {
    /// Whether the exception interrupted code running on the process stack,
    /// that is unprivileged box code.
    pub const fn from_process_stack(&self) -> bool {
        self.0 & 0x4 != 0
    }

    /// The stack the exception frame was pushed to.
    pub const fn stack_pointer(&self, msp: usize, psp: usize) -> usize {
        if self.from_process_stack() {
            psp
        } else {
            msp
        }
    }
}

/// State captured for one fault, consumed within the same exception.
#[derive(Clone, Copy, Debug)]
pub struct FaultContext {
    pub exception: SystemException,
    pub exc_return: ExcReturn,
    /// Stack holding the exception frame.
    pub sp: usize,
    /// Faulting PC, when it was read from the box stack.
    pub pc: Option<u32>,
    pub fault_address: usize,
    pub bus_fault_status: u8,
    pub status: FaultStatus,
}

impl FaultContext {
    fn capture<E: ExceptionRegisters>(
        exceptions: &E,
        exception: SystemException,
        exc_return: ExcReturn,
        msp: usize,
    ) -> FaultContext {
        FaultContext {
            exception,
            exc_return,
            sp: exc_return.stack_pointer(msp, exceptions.psp()),
            pc: None,
            fault_address: exceptions.bus_fault_address(),
            bus_fault_status: exceptions.bus_fault_status(),
            status: exceptions.fault_status(),
        }
    }
}

impl fmt::Display for FaultContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} EXC_RETURN: {:#010x} ({} stack) SP: {:#010x}",
            self.exception,
            self.exc_return.0,
            if self.exc_return.from_process_stack() {
                "process"
            } else {
                "main"
            },
            self.sp
        )?;
        if let Some(pc) = self.pc {
            write!(f, " PC: {:#010x}", pc)?;
        }
        write!(
            f,
            " fault address: {:#010x} BFSR: {:#04x}\r\n{}",
            self.fault_address, self.bus_fault_status, self.status
        )
    }
}

impl<C: Chip, const NUM_BOXES: usize, const MAX_ACLS: usize> Vmpu<'_, C, NUM_BOXES, MAX_ACLS> {
    /// Handle the active system exception.
    ///
    /// Returns if the exception was resolved, in which case the faulting
    /// instruction is retried on exception return. PendSV and SysTick are
    /// forwarded to the privileged hooks, which may switch boxes.
    pub fn sys_mux_handler(&self, exc_return: usize, msp: usize) {
        let exception = SystemException::from_ipsr(self.chip.exceptions().ipsr());
        match exception {
            SystemException::PendSV => match self.hooks.get().pendsv {
                Some(hook) => hook(),
                None => self.fatal(
                    HaltError::NotImplemented,
                    None,
                    format_args!("No PendSV IRQ hook registered"),
                ),
            },
            SystemException::SysTick => match self.hooks.get().systick {
                Some(hook) => hook(),
                None => self.fatal(
                    HaltError::NotImplemented,
                    None,
                    format_args!("No SysTick IRQ hook registered"),
                ),
            },
            SystemException::Other(irqn) => self.fatal(
                HaltError::NotAllowed,
                None,
                format_args!("Active IRQn({}) is not a system interrupt", irqn),
            ),
            _ => {
                if self.in_fault.replace(true) {
                    self.fatal(
                        HaltError::NotAllowed,
                        None,
                        format_args!("Nested fault in the vMPU fault handler"),
                    );
                }
                self.handle_fault(exception, ExcReturn(exc_return), msp);
                self.in_fault.set(false);
            }
        }
    }

    fn handle_fault(&self, exception: SystemException, exc_return: ExcReturn, msp: usize) {
        let (error, message) = match exception {
            SystemException::BusFault => return self.handle_bus_fault(exc_return, msp),
            SystemException::MemoryManagement => {
                (HaltError::FaultMemManage, "Memory management fault")
            }
            SystemException::UsageFault => (HaltError::FaultUsage, "Usage fault"),
            SystemException::HardFault => (HaltError::FaultHard, "Hard fault"),
            SystemException::DebugMonitor => (HaltError::FaultDebug, "Debug monitor fault"),
            SystemException::PendSV | SystemException::SysTick | SystemException::Other(_) => {
                (HaltError::NotAllowed, "Not a fault exception")
            }
        };

        let context = FaultContext::capture(self.chip.exceptions(), exception, exc_return, msp);
        self.fatal(error, Some(&context), format_args!("{}", message));
    }

    fn handle_bus_fault(&self, exc_return: ExcReturn, msp: usize) {
        let exceptions = self.chip.exceptions();
        let mut context =
            FaultContext::capture(exceptions, SystemException::BusFault, exc_return, msp);

        if !exc_return.from_process_stack() {
            self.fatal(
                HaltError::FaultBus,
                Some(&context),
                format_args!("Cannot recover from privileged bus fault"),
            );
        }

        let psp = context.sp;
        // SAFETY: `psp` is the process stack the exception frame was pushed
        // to, and the load is performed with the box's own access rights.
        let pc = unsafe { exceptions.read_unprivileged_u32(psp.wrapping_add(STACKED_PC_OFFSET)) };
        context.pc = Some(pc);
        let fault_status = context.bus_fault_status;

        let mpu = self.chip.mpu();
        match mpu.fault_syndrome() {
            FaultSyndrome::SlavePort(port) => {
                // The MPU error address supersedes BFAR.
                context.fault_address = mpu.fault_address(port);
                if page::resolve_page_fault(&self.memory, self.pages, context.fault_address)
                    .is_ok()
                {
                    exceptions.clear_bus_fault_status(fault_status);
                    mpu.clear_fault(port);
                    return;
                }
            }
            FaultSyndrome::Multiple => {
                vmpu_debug!("multiple MPU violations found");
            }
            FaultSyndrome::None => {}
        }

        if self
            .bus_recovery
            .recover(pc, psp, context.fault_address, fault_status)
            .is_ok()
        {
            exceptions.clear_bus_fault_status(fault_status);
            return;
        }

        exceptions.clear_bus_fault_status(fault_status);
        self.fatal(
            HaltError::PermissionDenied,
            Some(&context),
            format_args!("Access to restricted resource denied"),
        );
    }
}

impl<C: Chip, const NUM_BOXES: usize, const MAX_ACLS: usize> SystemExceptionHandler
    for Vmpu<'_, C, NUM_BOXES, MAX_ACLS>
{
    fn handle_system_exception(&self, exc_return: usize, msp: usize) {
        self.sys_mux_handler(exc_return, msp);
    }
}
