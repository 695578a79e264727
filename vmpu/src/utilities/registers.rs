// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Re-export of the register interface so architecture crates can reach it
//! through this crate, keeping their dependency list to one entry.

pub use tock_registers::interfaces;
pub use tock_registers::registers::{ReadOnly, ReadWrite};
pub use tock_registers::{register_bitfields, register_structs, LocalRegisterCopy};
