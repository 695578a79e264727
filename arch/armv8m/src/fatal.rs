// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! The end of the line for unrecoverable faults.

use vmpu::debug;
use vmpu::fault::FaultDescriptor;

use crate::support;

/// Dump the fault descriptor to the registered debug sink and park the
/// core. Never returns; the only way out is a reset.
pub fn halt(fault: FaultDescriptor) -> ! {
    debug!("{}", fault);
    loop {
        support::nop();
    }
}
