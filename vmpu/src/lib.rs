// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Core box-isolation supervisor.
//!
//! This crate implements the portable half of the vMPU: the per-box ACL
//! tables, the cache of hardware protection slots, the secure-fault recovery
//! path, the box context switch and the SRAM carving done at init. Everything
//! hardware-shaped (MPU/SAU/SCB registers, stacked-frame reads, barriers) is
//! reached through the [`platform::protection::ProtectionUnit`] trait so the
//! supervisor can run against a mock on the host.
//!
//! The crate holds no statics of its own. A board builds one
//! [`supervisor::Supervisor`], configures its boxes while it still owns it
//! exclusively, and then shares it with the architecture crate's exception
//! entry point.

#![no_std]

pub use tock_registers::{register_bitfields, register_structs};

#[macro_use]
pub mod debug;

pub mod acl;
pub mod fault;
pub mod layout;
pub mod page_alloc;
pub mod platform;
pub mod region;
pub mod slots;
pub mod supervisor;
pub mod utilities;

pub use crate::acl::AclWord;
pub use crate::fault::{ExceptionKind, FaultDescriptor, HaltReason};
pub use crate::platform::MemoryMap;
pub use crate::region::Region;
pub use crate::supervisor::{Supervisor, SysMuxHandler};
