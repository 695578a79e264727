// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Generic support for ARMv8-M TrustZone platforms.
//!
//! Implements the supervisor's hardware interface against the real SCB, SAU
//! and MPU register blocks, and owns the Secure-state entry point that the
//! shared system-exception vector stub tail-calls into.

#![no_std]

pub mod exc_return;
pub mod fatal;
pub mod frame;
pub mod mpu;
pub mod protection;
pub mod sau;
pub mod scb;
pub mod support;

pub use crate::protection::Armv8mProtection;

use vmpu::fault::{FaultDescriptor, HaltReason};
use vmpu::supervisor::SysMuxHandler;

/// Hardware protection entries implemented by the SAU and mirrored in the
/// MPU on this architecture.
pub const NUM_SLOTS: usize = 8;

/// The supervisor type a TrustZone board instantiates, fixed to this
/// architecture's driver and slot count.
pub type SecureSupervisor<P> = vmpu::Supervisor<Armv8mProtection, P, NUM_SLOTS>;

static mut SUPERVISOR: Option<&'static dyn SysMuxHandler> = None;

/// Register the supervisor the exception entry point dispatches to.
///
/// ## Safety
///
/// Must be called during single-threaded bring-up, before
/// [`ProtectionUnit::enable_fault_exceptions`] lets the first fault fire.
///
/// [`ProtectionUnit::enable_fault_exceptions`]:
///     vmpu::platform::protection::ProtectionUnit::enable_fault_exceptions
pub unsafe fn set_supervisor(supervisor: &'static dyn SysMuxHandler) {
    SUPERVISOR = Some(supervisor);
}

/// Secure-state system-exception entry point.
///
/// The vector stub for every muxed system exception captures EXC_RETURN and
/// the secure MSP, calls this, and resumes through whatever EXC_RETURN value
/// comes back. A fatal outcome never returns.
#[no_mangle]
pub unsafe extern "C" fn vmpu_sys_mux_handler(exc_return: u32, msp_s: u32) -> u32 {
    let supervisor = match SUPERVISOR {
        Some(supervisor) => supervisor,
        None => fatal::halt(FaultDescriptor::new(
            None,
            HaltReason::NotImplemented,
            exc_return,
            0,
        )),
    };
    match supervisor.sys_mux(exc_return, msp_s) {
        Ok(resume) => resume,
        Err(fault) => fatal::halt(fault),
    }
}
