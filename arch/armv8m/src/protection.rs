// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! The supervisor's hardware interface, wired to the real SAU and MPU.

use vmpu::platform::protection::ProtectionUnit;
use vmpu::region::Region;
use vmpu::slots::STATIC_SLOTS;

use crate::exc_return::ExcReturnValue;
use crate::frame;
use crate::mpu::Mpu;
use crate::sau::Sau;
use crate::support;
use crate::NUM_SLOTS;

/// The ARMv8-M protection unit pair behind the supervisor's slots.
///
/// There should only be one instantiation of this object as it represents
/// real hardware.
pub struct Armv8mProtection {
    sau: Sau,
    mpu: Mpu,
}

impl Armv8mProtection {
    pub const unsafe fn new() -> Armv8mProtection {
        Armv8mProtection {
            sau: Sau::new(),
            mpu: Mpu::new(),
        }
    }
}

impl ProtectionUnit for Armv8mProtection {
    fn mpu_set(&self, slot: usize, region: &Region) {
        self.mpu.set_region(slot, region);
    }

    fn mpu_invalidate(&self) {
        for slot in STATIC_SLOTS..NUM_SLOTS {
            self.mpu.invalidate_region(slot);
            self.sau.invalidate_region(slot);
        }
    }

    fn sau_set(&self, slot: usize, region: &Region) {
        self.sau.set_region(slot, region);
    }

    fn sync(&self) {
        support::barrier();
    }

    fn read_frame_word(&self, sp: u32, word_offset: usize) -> u32 {
        frame::read_frame_word(sp, word_offset)
    }

    fn cpu_ipsr(&self) -> u32 {
        support::ipsr()
    }

    fn sp_for(&self, exc_return: u32, msp_s: u32) -> u32 {
        let exc = ExcReturnValue::new(exc_return);
        if exc.secure_stack() {
            if exc.thread_mode() && exc.process_stack() {
                support::psp()
            } else {
                msp_s
            }
        } else if exc.thread_mode() && exc.process_stack() {
            support::psp_ns()
        } else {
            support::msp_ns()
        }
    }

    fn secure_fault_status(&self) -> u32 {
        self.sau.secure_fault_status()
    }

    fn secure_fault_address(&self) -> u32 {
        self.sau.secure_fault_address()
    }

    fn secure_fault_clear(&self, status: u32) {
        self.sau.secure_fault_clear(status);
    }

    fn enable_fault_exceptions(&self) {
        unsafe {
            crate::scb::enable_fault_exceptions();
        }
        self.sau.enable();
        self.mpu.enable();
        support::barrier();
    }
}
