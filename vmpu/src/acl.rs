// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Access-control words.
//!
//! Every region carries one packed 32-bit ACL describing what the box (the
//! "user" side, running Non-secure) and the supervisor (the Secure side) may
//! do with it. The word is opaque to everything except the hardware driver,
//! which lowers it onto MPU/SAU attributes, and the region lookup, which
//! hands it back to call-gate code.

use tock_registers::{register_bitfields, LocalRegisterCopy};

register_bitfields![u32,
    pub TrustAcl [
        /// Box may read the region.
        UREAD OFFSET(0) NUMBITS(1) [],
        /// Box may write the region.
        UWRITE OFFSET(1) NUMBITS(1) [],
        /// Box may execute from the region.
        UEXECUTE OFFSET(2) NUMBITS(1) [],
        /// Supervisor may read the region.
        SREAD OFFSET(3) NUMBITS(1) [],
        /// Supervisor may write the region.
        SWRITE OFFSET(4) NUMBITS(1) [],
        /// Supervisor may execute from the region.
        SEXECUTE OFFSET(5) NUMBITS(1) [],
        /// Region holds secure-gateway veneers callable from Non-secure
        /// state. Lowered onto the SAU's NSC attribute by the driver.
        NSCALLABLE OFFSET(6) NUMBITS(1) [],
        /// Region is a box stack (plus saved context) block.
        STACK OFFSET(7) NUMBITS(1) [],
        /// Sizing and memory-attribute hints for the driver.
        SIZE_ATTR OFFSET(8) NUMBITS(8) []
    ]
];

/// A packed access-control word.
///
/// A wrapper around a [`TrustAcl`]-shaped register value. Regions store one;
/// comparisons and the 0-means-denied convention go through the raw `u32`.
#[derive(Copy, Clone, Debug)]
pub struct AclWord(LocalRegisterCopy<u32, TrustAcl::Register>);

impl AclWord {
    /// An ACL permitting nothing. Lookup paths use this as "denied".
    pub const fn empty() -> AclWord {
        AclWord(LocalRegisterCopy::new(0))
    }

    /// Default ACL for a box stack/context block.
    pub fn stack_default() -> AclWord {
        AclWord::from_fields(
            TrustAcl::UREAD::SET
                + TrustAcl::UWRITE::SET
                + TrustAcl::SREAD::SET
                + TrustAcl::SWRITE::SET
                + TrustAcl::STACK::SET,
        )
    }

    /// Default ACL for a box bss/data block.
    pub fn data_default() -> AclWord {
        AclWord::from_fields(
            TrustAcl::UREAD::SET
                + TrustAcl::UWRITE::SET
                + TrustAcl::SREAD::SET
                + TrustAcl::SWRITE::SET,
        )
    }

    /// Box-readable, box-writable data with no execute rights. Used for
    /// public SRAM/flash windows and the synthesized SCR grant.
    pub fn user_rw() -> AclWord {
        AclWord::from_fields(TrustAcl::UREAD::SET + TrustAcl::UWRITE::SET)
    }

    /// Box-accessible code and data, the ACL of the public flash windows.
    pub fn user_rwx() -> AclWord {
        AclWord::from_fields(
            TrustAcl::UREAD::SET + TrustAcl::UWRITE::SET + TrustAcl::UEXECUTE::SET,
        )
    }

    /// Secure-gateway window: executable from both worlds, NSC set.
    pub fn entry_points() -> AclWord {
        AclWord::from_fields(
            TrustAcl::UEXECUTE::SET + TrustAcl::SEXECUTE::SET + TrustAcl::NSCALLABLE::SET,
        )
    }

    pub fn from_fields(
        fields: tock_registers::fields::FieldValue<u32, TrustAcl::Register>,
    ) -> AclWord {
        AclWord(LocalRegisterCopy::new(fields.value))
    }

    /// Extract the raw `u32` representation.
    pub fn get(&self) -> u32 {
        self.0.get()
    }

    pub fn is_set(&self, field: tock_registers::fields::Field<u32, TrustAcl::Register>) -> bool {
        self.0.read(field) != 0
    }
}

impl PartialEq<AclWord> for AclWord {
    fn eq(&self, other: &Self) -> bool {
        self.0.get() == other.0.get()
    }
}

impl Eq for AclWord {}
