// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! In-kernel debug output.
//!
//! The supervisor has no console of its own; the board registers whatever
//! `core::fmt::Write` sink it has (a UART, a semihosting channel) during
//! bring-up and the [`debug!`] macro writes through it. Output before
//! registration, and on boards that never register a sink, is dropped.

use core::fmt::{Arguments, Write};

use crate::utilities::cells::TakeCell;

/// Holder for the registered output sink.
pub struct DebugWriter {
    writer: TakeCell<'static, dyn Write>,
}

impl DebugWriter {
    pub fn new(writer: &'static mut dyn Write) -> DebugWriter {
        DebugWriter {
            writer: TakeCell::new(writer),
        }
    }
}

static mut DEBUG_WRITER: Option<&'static DebugWriter> = None;

/// Register the board's output sink.
///
/// ## Safety
///
/// Must be called during single-threaded bring-up, before any exception that
/// might log can fire.
pub unsafe fn set_debug_writer(writer: &'static DebugWriter) {
    DEBUG_WRITER = Some(writer);
}

fn with_writer(f: impl FnOnce(&mut dyn Write)) {
    // Single-core and set once during bring-up, so a plain read is sound.
    let holder = unsafe { DEBUG_WRITER };
    if let Some(holder) = holder {
        holder.writer.map(|writer| f(writer));
    }
}

#[doc(hidden)]
pub fn begin_debug_fmt(args: Arguments) {
    with_writer(|writer| {
        let _ = writer.write_fmt(args);
        let _ = writer.write_str("\r\n");
    });
}

/// In-kernel `println()` over the registered sink.
#[macro_export]
macro_rules! debug {
    () => ({
        $crate::debug!("")
    });
    ($msg:expr $(,)?) => ({
        $crate::debug::begin_debug_fmt(format_args!($msg))
    });
    ($fmt:expr, $($arg:tt)+) => ({
        $crate::debug::begin_debug_fmt(format_args!($fmt, $($arg)+))
    });
}
