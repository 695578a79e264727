// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! ARMv8-M Memory Protection Unit.
//!
//! The v8-M MPU abandons the power-of-two regions of its predecessors for
//! base/limit pairs with 32-byte granularity, which lets supervisor regions
//! map onto MPU entries directly. Each protection slot mirrors its SAU
//! region here so the access-permission half of the ACL is enforced as well
//! as the attribution half.

use vmpu::acl::TrustAcl;
use vmpu::region::Region;
use vmpu::utilities::registers::interfaces::Writeable;
use vmpu::utilities::registers::{register_bitfields, register_structs, ReadOnly, ReadWrite};

register_structs! {
    pub MpuRegisters {
        /// Indicates whether the MPU is present and how many regions it
        /// supports.
        (0x00 => pub mpu_type: ReadOnly<u32, Type::Register>),

        /// The control register: enables the MPU and the default memory
        /// map for privileged code.
        (0x04 => pub ctrl: ReadWrite<u32, Control::Register>),

        /// Selects the region referenced by RBAR/RLAR.
        (0x08 => pub rnr: ReadWrite<u32, RegionNumber::Register>),

        /// Base address, shareability and access permissions of the
        /// selected region.
        (0x0c => pub rbar: ReadWrite<u32, RegionBaseAddress::Register>),

        /// Limit address, attribute index and enable of the selected
        /// region.
        (0x10 => pub rlar: ReadWrite<u32, RegionLimitAddress::Register>),

        (0x14 => _reserved0),

        /// Memory attribute indirection registers.
        (0x30 => pub mair0: ReadWrite<u32>),
        (0x34 => pub mair1: ReadWrite<u32>),

        (0x38 => @END),
    }
}

register_bitfields![u32,
    Type [
        /// The number of data regions supported. Reads-as-zero means the
        /// processor does not implement an MPU.
        DREGION OFFSET(8) NUMBITS(8) [],
        /// Support for unified (0) or separate (1) instruction and data
        /// regions. Always unified on v8-M.
        SEPARATE OFFSET(0) NUMBITS(1) []
    ],

    Control [
        /// Enables the default memory map for privileged access.
        PRIVDEFENA OFFSET(2) NUMBITS(1) [],
        /// Keeps the MPU active in HardFault and NMI handlers.
        HFNMIENA OFFSET(1) NUMBITS(1) [],
        /// Enables the MPU.
        ENABLE OFFSET(0) NUMBITS(1) []
    ],

    RegionNumber [
        REGION OFFSET(0) NUMBITS(8) []
    ],

    RegionBaseAddress [
        /// Bits [31:5] of the region's first address.
        BASE OFFSET(5) NUMBITS(27) [],
        /// Shareability of Normal memory.
        SH OFFSET(3) NUMBITS(2) [],
        /// Access permissions.
        AP OFFSET(1) NUMBITS(2) [
            ReadWritePrivileged = 0b00,
            ReadWrite = 0b01,
            ReadOnlyPrivileged = 0b10,
            ReadOnly = 0b11
        ],
        /// Execute-never.
        XN OFFSET(0) NUMBITS(1) []
    ],

    RegionLimitAddress [
        /// Bits [31:5] of the region's last address.
        LIMIT OFFSET(5) NUMBITS(27) [],
        /// Index into MAIR0/MAIR1 for the memory attributes.
        ATTRINDX OFFSET(1) NUMBITS(3) [],
        /// Enables the region.
        ENABLE OFFSET(0) NUMBITS(1) []
    ]
];

const MPU_BASE: *const MpuRegisters = 0xE000_ED90 as *const MpuRegisters;

/// State related to the real physical MPU.
///
/// There should only be one instantiation of this object as it represents
/// real hardware.
pub struct Mpu {
    base: *const MpuRegisters,
}

impl Mpu {
    /// ## Safety
    ///
    /// Only one `Mpu` may exist; concurrent owners would fight over the
    /// RNR/RBAR/RLAR programming window.
    pub const unsafe fn new() -> Mpu {
        Mpu { base: MPU_BASE }
    }

    fn registers(&self) -> &MpuRegisters {
        // SAFETY: the block is architecturally mapped for the program
        // duration and only reached through the volatile register types.
        unsafe { &*self.base }
    }

    /// Enable the MPU, keeping the default map for privileged (supervisor)
    /// code and dropping protection inside HardFault/NMI handlers.
    pub fn enable(&self) {
        self.registers().ctrl.write(
            Control::ENABLE::SET + Control::HFNMIENA::CLEAR + Control::PRIVDEFENA::SET,
        );
    }

    /// Program region `index` from `region`, lowering the ACL onto v8-M
    /// access permissions.
    pub fn set_region(&self, index: usize, region: &Region) {
        let acl = region.acl();

        // Page-heap regions carry no ACL of their own; the config sentinel
        // marks them and they are always box-writable data.
        let page_region = region.config() & 1 != 0;
        let ap = if acl.is_set(TrustAcl::UWRITE) || page_region {
            RegionBaseAddress::AP::ReadWrite
        } else if acl.is_set(TrustAcl::UREAD) {
            RegionBaseAddress::AP::ReadOnly
        } else {
            RegionBaseAddress::AP::ReadWritePrivileged
        };
        let executable = acl.is_set(TrustAcl::UEXECUTE) || acl.is_set(TrustAcl::SEXECUTE);
        let xn = if executable {
            RegionBaseAddress::XN::CLEAR
        } else {
            RegionBaseAddress::XN::SET
        };

        let limit = (region.end() - 1) & !0x1f;

        let registers = self.registers();
        registers
            .rnr
            .write(RegionNumber::REGION.val(index as u32));
        registers
            .rbar
            .write(RegionBaseAddress::BASE.val(region.start() >> 5) + ap + xn);
        registers.rlar.write(
            RegionLimitAddress::LIMIT.val(limit >> 5)
                + RegionLimitAddress::ATTRINDX.val(0)
                + RegionLimitAddress::ENABLE::SET,
        );
    }

    /// Disable region `index`.
    pub fn invalidate_region(&self, index: usize) {
        let registers = self.registers();
        registers
            .rnr
            .write(RegionNumber::REGION.val(index as u32));
        registers.rlar.set(0);
    }
}
