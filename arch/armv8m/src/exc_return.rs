// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! EXC_RETURN decoding.
//!
//! On exception entry the link register is loaded with a magic EXC_RETURN
//! word describing the interrupted context. The dispatcher needs three of
//! its bits to find that context's stack: which security state's stack was
//! in use, whether the core was in thread or handler mode, and whether the
//! process stack was selected.

use vmpu::utilities::registers::{register_bitfields, LocalRegisterCopy};

register_bitfields![u32,
    pub ExcReturn [
        /// Exception was taken from the Secure state.
        ES OFFSET(0) NUMBITS(1) [],
        /// Default callee register stacking was skipped.
        DCRS OFFSET(5) NUMBITS(1) [],
        /// Stack frame has no floating-point state.
        FTYPE OFFSET(4) NUMBITS(1) [],
        /// Return is to thread mode (as opposed to a preempted handler).
        MODE OFFSET(3) NUMBITS(1) [],
        /// Return restores from the process stack pointer.
        SPSEL OFFSET(2) NUMBITS(1) [],
        /// Registers were stacked on a Secure stack.
        S OFFSET(6) NUMBITS(1) []
    ]
];

/// A captured EXC_RETURN value.
#[derive(Copy, Clone)]
pub struct ExcReturnValue(LocalRegisterCopy<u32, ExcReturn::Register>);

impl ExcReturnValue {
    pub const fn new(value: u32) -> ExcReturnValue {
        ExcReturnValue(LocalRegisterCopy::new(value))
    }

    /// The interrupted context stacked onto a Secure stack.
    pub fn secure_stack(&self) -> bool {
        self.0.is_set(ExcReturn::S)
    }

    /// The interrupted context ran in thread mode.
    pub fn thread_mode(&self) -> bool {
        self.0.is_set(ExcReturn::MODE)
    }

    /// The interrupted context used the process stack pointer.
    pub fn process_stack(&self) -> bool {
        self.0.is_set(ExcReturn::SPSEL)
    }
}
