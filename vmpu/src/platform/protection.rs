// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface for the hardware protection unit.
//!
//! Everything the supervisor does to the machine goes through this trait:
//! programming MPU and SAU entries, reading the faulting context, poking the
//! fault-control registers. The architecture crate implements it against
//! real registers; the test suite implements it against a mock, which is the
//! only reason the recovery and dispatch logic is testable on a host.

use crate::region::Region;

/// `SFSR.AUVIOL`: an attribution-unit violation, the recoverable class.
pub const SFSR_AUVIOL: u32 = 1 << 3;

/// `SFSR.SFARVALID`: the fault address register holds the faulting address.
pub const SFSR_SFARVALID: u32 = 1 << 6;

/// Number of words in a stacked exception frame (no FP extension).
pub const FRAME_WORDS: usize = 8;

/// Word offset of the stacked PC inside the exception frame.
pub const FRAME_PC_WORD: usize = 6;

/// The hardware protection unit, as seen by the supervisor.
pub trait ProtectionUnit {
    /// Address of the System Control Register, the one SCB word boxes are
    /// allowed to poke directly (sleep configuration).
    const SCR_ADDRESS: u32 = 0xE000_ED10;

    /// Program MPU entry `slot` from `region`.
    fn mpu_set(&self, slot: usize, region: &Region);

    /// Disable every dynamic MPU/SAU entry. Slot bookkeeping is the
    /// caller's; this only silences the hardware.
    fn mpu_invalidate(&self);

    /// Program SAU entry `slot` from `region`. The region's config word
    /// carries extra attribution bits and is forwarded untouched.
    fn sau_set(&self, slot: usize, region: &Region);

    /// Barrier closing a burst of slot writes. Nothing programmed before
    /// this call is architecturally visible until it returns.
    fn sync(&self);

    /// Read one word of the stacked exception frame at `sp`, using an
    /// unprivileged load so a forged stack pointer cannot leak Secure
    /// memory. Offsets past the frame return the sentinel 0; recovered
    /// values (the PC in particular) are untrusted either way.
    fn read_frame_word(&self, sp: u32, word_offset: usize) -> u32;

    /// Current IPSR value.
    fn cpu_ipsr(&self) -> u32;

    /// Select the interrupted context's stack pointer from the EXC_RETURN
    /// bits: secure/non-secure crossed with MSP/PSP. `msp_s` is the secure
    /// main stack pointer captured by the vector stub.
    fn sp_for(&self, exc_return: u32, msp_s: u32) -> u32;

    /// Current SFSR value.
    fn secure_fault_status(&self) -> u32;

    /// Current SFAR value. Only meaningful while `SFARVALID` is set.
    fn secure_fault_address(&self) -> u32;

    /// Clear the given SFSR bits (write-one-to-clear).
    fn secure_fault_clear(&self, status: u32);

    /// One-time exception plumbing: route the fault classes to the Secure
    /// state and enable them (AIRCR and SHCSR configuration).
    fn enable_fault_exceptions(&self);
}
