// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Fault classification and the descriptor handed to the halt path.
//!
//! The dispatcher never propagates errors upward: an exception either
//! resumes the interrupted context or the core halts. A [`FaultDescriptor`]
//! is everything the halt path knows; its `Display` output is the dump a
//! developer sees on the debug console.

use core::fmt;

/// System exceptions sharing the muxed vector, by architectural exception
/// number (IPSR value minus the 16-entry external-interrupt offset).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExceptionKind {
    NonMaskableInt,
    HardFault,
    MemManage,
    BusFault,
    UsageFault,
    SecureFault,
    SVCall,
    DebugMonitor,
    PendSV,
    SysTick,
}

impl ExceptionKind {
    /// Map a signed system-exception number to its kind. External interrupts
    /// (`number >= 0`) and reserved slots return `None`.
    pub fn from_exception_number(number: i32) -> Option<ExceptionKind> {
        match number {
            -14 => Some(ExceptionKind::NonMaskableInt),
            -13 => Some(ExceptionKind::HardFault),
            -12 => Some(ExceptionKind::MemManage),
            -11 => Some(ExceptionKind::BusFault),
            -10 => Some(ExceptionKind::UsageFault),
            -9 => Some(ExceptionKind::SecureFault),
            -5 => Some(ExceptionKind::SVCall),
            -4 => Some(ExceptionKind::DebugMonitor),
            -2 => Some(ExceptionKind::PendSV),
            -1 => Some(ExceptionKind::SysTick),
            _ => None,
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExceptionKind::NonMaskableInt => "NonMaskableInt",
            ExceptionKind::HardFault => "HardFault",
            ExceptionKind::MemManage => "MemManage",
            ExceptionKind::BusFault => "BusFault",
            ExceptionKind::UsageFault => "UsageFault",
            ExceptionKind::SecureFault => "SecureFault",
            ExceptionKind::SVCall => "SVCall",
            ExceptionKind::DebugMonitor => "DebugMonitor",
            ExceptionKind::PendSV => "PendSV",
            ExceptionKind::SysTick => "SysTick",
        };
        f.write_str(name)
    }
}

/// Why the dispatcher gave up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HaltReason {
    /// A secure fault with no covering region, or with insufficient access.
    PermissionDenied,
    /// A fault class that cannot be made transparent at this layer.
    Unrecoverable,
    /// A reserved vector with no handler registered here.
    NotImplemented,
    /// An exception number outside the system range.
    NotASystemInterrupt(i32),
}

/// Snapshot of a fatal exception, rendered by the halt path.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FaultDescriptor {
    /// The exception that fired, when it maps to a known kind.
    pub kind: Option<ExceptionKind>,
    pub reason: HaltReason,
    /// EXC_RETURN value active when the exception was taken.
    pub exc_return: u32,
    /// Stack pointer of the interrupted context.
    pub sp: u32,
}

impl FaultDescriptor {
    pub fn new(
        kind: Option<ExceptionKind>,
        reason: HaltReason,
        exc_return: u32,
        sp: u32,
    ) -> FaultDescriptor {
        FaultDescriptor {
            kind,
            reason,
            exc_return,
            sp,
        }
    }
}

impl fmt::Display for FaultDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\r\n---| Fault Status |---\r\n")?;
        match self.kind {
            Some(kind) => write!(f, "Exception:    {}\r\n", kind)?,
            None => write!(f, "Exception:    <unknown>\r\n")?,
        }
        match self.reason {
            HaltReason::PermissionDenied => {
                write!(f, "Reason:       access denied by every reachable ACL\r\n")?
            }
            HaltReason::Unrecoverable => {
                write!(f, "Reason:       cannot recover from this fault\r\n")?
            }
            HaltReason::NotImplemented => {
                write!(f, "Reason:       no handler registered\r\n")?
            }
            HaltReason::NotASystemInterrupt(number) => write!(
                f,
                "Reason:       IRQn {} is not a system interrupt\r\n",
                number
            )?,
        }
        write!(f, "EXC_RETURN:   {:#010x}\r\n", self.exc_return)?;
        write!(f, "Stack:        {:#010x}\r\n", self.sp)
    }
}
