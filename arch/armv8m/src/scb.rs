// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! ARMv8-M System Control Block.
//!
//! Only the slice of the SCB the supervisor touches: exception routing and
//! priority partitioning in AIRCR, the fault enables in SHCSR, and the SCR,
//! which is never written here but whose address the recovery path treats
//! specially.

use vmpu::utilities::registers::interfaces::{ReadWriteable, Readable, Writeable};
use vmpu::utilities::registers::{register_bitfields, register_structs, ReadOnly, ReadWrite};

register_structs! {
    pub ScbRegisters {
        /// CPUID Base Register
        (0x00 => pub cpuid: ReadOnly<u32, CpuId::Register>),

        /// Interrupt Control and State Register
        (0x04 => pub icsr: ReadWrite<u32>),

        /// Vector Table Offset Register
        (0x08 => pub vtor: ReadWrite<u32>),

        /// Application Interrupt and Reset Control Register
        (0x0c => pub aircr: ReadWrite<u32, ApplicationInterruptAndReset::Register>),

        /// System Control Register
        (0x10 => pub scr: ReadWrite<u32, SystemControl::Register>),

        /// Configuration and Control Register
        (0x14 => pub ccr: ReadWrite<u32>),

        /// System Handler Priority Registers
        (0x18 => pub shpr: [ReadWrite<u32>; 3]),

        /// System Handler Control and State Register
        (0x24 => pub shcsr: ReadWrite<u32, SystemHandlerControlAndState::Register>),

        (0x28 => @END),
    }
}

register_bitfields![u32,
    CpuId [
        /// Implementer code assigned by ARM. ARM implementations are 0x41.
        IMPLEMENTER OFFSET(24) NUMBITS(8),
        /// Implementer-defined variant number.
        VARIANT OFFSET(20) NUMBITS(4),
        /// Architecture always reads as 0xF for Cortex-M.
        ARCHITECTURE OFFSET(16) NUMBITS(4),
        /// Implementer-defined part number.
        PARTNO OFFSET(4) NUMBITS(12),
        /// Implementer-defined revision number.
        REVISION OFFSET(0) NUMBITS(4)
    ],

    ApplicationInterruptAndReset [
        /// Key field. Must write 0x05FA or the write is ignored.
        VECTKEY OFFSET(16) NUMBITS(16),
        /// 0=Little endian, 1=Big endian. RO.
        ENDIANNESS OFFSET(15) NUMBITS(1),
        /// De-prioritize Non-secure exceptions below all Secure ones.
        PRIS OFFSET(14) NUMBITS(1),
        /// Route BusFault, HardFault and NMI to the Non-secure state.
        BFHFNMINS OFFSET(13) NUMBITS(1),
        /// Binary point position for priority grouping.
        PRIGROUP OFFSET(8) NUMBITS(3),
        /// Writing 1 requests a system reset.
        SYSRESETREQ OFFSET(2) NUMBITS(1),
        /// Writing 1 clears all exception state. Debug use only.
        VECTCLRACTIVE OFFSET(1) NUMBITS(1)
    ],

    SystemControl [
        SEVONPEND OFFSET(4) NUMBITS(1),
        SLEEPDEEPS OFFSET(3) NUMBITS(1),
        SLEEPDEEP OFFSET(2) NUMBITS(1),
        SLEEPONEXIT OFFSET(1) NUMBITS(1)
    ],

    SystemHandlerControlAndState [
        /// SecureFault exception enable.
        SECUREFAULTENA OFFSET(19) NUMBITS(1),
        /// UsageFault enable for the selected security state.
        USGFAULTENA OFFSET(18) NUMBITS(1),
        /// BusFault exception enable.
        BUSFAULTENA OFFSET(17) NUMBITS(1),
        /// MemManage enable for the selected security state.
        MEMFAULTENA OFFSET(16) NUMBITS(1)
    ]
];

const SCB_BASE: *const ScbRegisters = 0xE000_ED00 as *const ScbRegisters;

fn scb() -> &'static ScbRegisters {
    // SAFETY: the System Control Space is architecturally mapped at this
    // address for as long as the core runs, and every access goes through
    // the volatile register types.
    unsafe { &*SCB_BASE }
}

/// Route the fault exceptions to the Secure state and enable them.
///
/// AIRCR is rewritten whole (the key field demands it) keeping the
/// read-only endianness bit and whatever priority grouping the boot code
/// chose: Non-secure exceptions are de-prioritized and BusFault, HardFault
/// and NMI stay Secure.
pub unsafe fn enable_fault_exceptions() {
    let scb = scb();
    let aircr = scb.aircr.extract();
    scb.aircr.write(
        ApplicationInterruptAndReset::VECTKEY.val(0x05FA)
            + ApplicationInterruptAndReset::ENDIANNESS
                .val(aircr.read(ApplicationInterruptAndReset::ENDIANNESS))
            + ApplicationInterruptAndReset::PRIGROUP
                .val(aircr.read(ApplicationInterruptAndReset::PRIGROUP))
            + ApplicationInterruptAndReset::PRIS::SET
            + ApplicationInterruptAndReset::BFHFNMINS::CLEAR,
    );

    scb.shcsr.modify(
        SystemHandlerControlAndState::SECUREFAULTENA::SET
            + SystemHandlerControlAndState::USGFAULTENA::SET
            + SystemHandlerControlAndState::BUSFAULTENA::SET
            + SystemHandlerControlAndState::MEMFAULTENA::SET,
    );
}
