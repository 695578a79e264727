// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! ARMv8-M Security Attribution Unit.
//!
//! The SAU is what actually makes a box's regions reachable: an enabled SAU
//! region marks its address range Non-secure (or secure-and-callable when
//! NSC is set), so a Non-secure box access stops faulting. Regions are
//! programmed through the RNR/RBAR/RLAR window, one slot per supervisor
//! protection slot.

use vmpu::acl::TrustAcl;
use vmpu::region::Region;
use vmpu::utilities::registers::interfaces::{Readable, Writeable};
use vmpu::utilities::registers::{register_bitfields, register_structs, ReadOnly, ReadWrite};

register_structs! {
    pub SauRegisters {
        /// The control register: enable, and the default attribution of
        /// memory while the SAU is disabled.
        (0x00 => pub ctrl: ReadWrite<u32, Control::Register>),

        /// Indicates how many regions this SAU implements.
        (0x04 => pub sau_type: ReadOnly<u32, Type::Register>),

        /// Selects the region referenced by RBAR/RLAR.
        (0x08 => pub rnr: ReadWrite<u32, RegionNumber::Register>),

        /// Base address of the selected region.
        (0x0c => pub rbar: ReadWrite<u32, RegionBaseAddress::Register>),

        /// Limit address, NSC attribute and enable of the selected region.
        (0x10 => pub rlar: ReadWrite<u32, RegionLimitAddress::Register>),

        /// Secure fault status.
        (0x14 => pub sfsr: ReadWrite<u32>),

        /// Address that caused the secure fault. Valid while
        /// `SFSR.SFARVALID` is set.
        (0x18 => pub sfar: ReadWrite<u32>),

        (0x1c => @END),
    }
}

register_bitfields![u32,
    Control [
        /// Attribution of all memory while the SAU is disabled.
        ALLNS OFFSET(1) NUMBITS(1) [
            AllSecure = 0,
            AllNonSecure = 1
        ],
        /// Enables the SAU.
        ENABLE OFFSET(0) NUMBITS(1) []
    ],

    Type [
        /// The number of implemented regions. Reads-as-zero means no SAU.
        SREGION OFFSET(0) NUMBITS(8) []
    ],

    RegionNumber [
        REGION OFFSET(0) NUMBITS(8) []
    ],

    RegionBaseAddress [
        /// Bits [31:5] of the region's first address.
        BADDR OFFSET(5) NUMBITS(27) []
    ],

    RegionLimitAddress [
        /// Bits [31:5] of the region's last address.
        LADDR OFFSET(5) NUMBITS(27) [],
        /// Region is Secure and Non-secure callable rather than Non-secure.
        NSC OFFSET(1) NUMBITS(1) [],
        /// Enables the region.
        ENABLE OFFSET(0) NUMBITS(1) []
    ]
];

const SAU_BASE: *const SauRegisters = 0xE000_EDD0 as *const SauRegisters;

/// State related to the real physical SAU.
///
/// There should only be one instantiation of this object as it represents
/// real hardware.
pub struct Sau {
    base: *const SauRegisters,
}

impl Sau {
    /// ## Safety
    ///
    /// Only one `Sau` may exist; concurrent owners would fight over the
    /// RNR/RBAR/RLAR programming window.
    pub const unsafe fn new() -> Sau {
        Sau { base: SAU_BASE }
    }

    fn registers(&self) -> &SauRegisters {
        // SAFETY: the block is architecturally mapped for the program
        // duration and only reached through the volatile register types.
        unsafe { &*self.base }
    }

    pub fn enable(&self) {
        self.registers()
            .ctrl
            .write(Control::ENABLE::SET + Control::ALLNS::AllSecure);
    }

    /// Program region `index` from `region`.
    ///
    /// The NSC attribute comes from the ACL; the region's config word is
    /// OR-ed into the limit register raw, carrying the sentinel bits the
    /// supervisor forwards without interpreting.
    pub fn set_region(&self, index: usize, region: &Region) {
        let limit = (region.end() - 1) & !0x1f;

        let registers = self.registers();
        registers
            .rnr
            .write(RegionNumber::REGION.val(index as u32));
        registers
            .rbar
            .write(RegionBaseAddress::BADDR.val(region.start() >> 5));

        let mut attributes =
            RegionLimitAddress::LADDR.val(limit >> 5) + RegionLimitAddress::ENABLE::SET;
        if region.acl().is_set(TrustAcl::NSCALLABLE) {
            attributes += RegionLimitAddress::NSC::SET;
        }
        registers.rlar.set(attributes.value | region.config());
    }

    /// Disable region `index`.
    pub fn invalidate_region(&self, index: usize) {
        let registers = self.registers();
        registers
            .rnr
            .write(RegionNumber::REGION.val(index as u32));
        registers.rlar.set(0);
    }

    pub fn secure_fault_status(&self) -> u32 {
        self.registers().sfsr.get()
    }

    pub fn secure_fault_address(&self) -> u32 {
        self.registers().sfar.get()
    }

    /// Clear the given SFSR bits. The register is write-one-to-clear, so
    /// writing back a captured status acknowledges exactly those flags.
    pub fn secure_fault_clear(&self, status: u32) {
        self.registers().sfsr.set(status);
    }
}
