// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! The supervisor: fault recovery, exception dispatch, box switching.
//!
//! One [`Supervisor`] value owns every piece of process-wide state: the
//! region tables, the slot cache, the SRAM carving cursor and the active-box
//! pointer. A board configures it while holding it exclusively (`&mut`
//! methods), then shares it; from that point the exception path and the
//! call-gate layer drive it through `&self` and all mutation goes through
//! cells. That ownership hand-off is the init/lock lifecycle.

use core::cell::Cell;
use core::fmt;

use crate::acl::AclWord;
use crate::fault::{ExceptionKind, FaultDescriptor, HaltReason};
use crate::layout::{BoxSram, SramLayout};
use crate::page_alloc::{ActivePage, Direction, PageAllocator};
use crate::platform::protection::{
    ProtectionUnit, FRAME_PC_WORD, SFSR_AUVIOL, SFSR_SFARVALID,
};
use crate::platform::MemoryMap;
use crate::region::{Region, RegionError, RegionTable};
use crate::slots::{SlotCache, SlotError};

/// The IPSR numbers exceptions from 0; IRQn numbering puts the first
/// external interrupt at 0 and the system exceptions below it.
const NVIC_OFFSET: i32 = 16;

/// Advisory slot priorities. Residency intent only; see [`crate::slots`].
const PRIORITY_STACK: u8 = 255;
const PRIORITY_PAGE: u8 = 100;
const PRIORITY_RECOVERY: u8 = 3;
const PRIORITY_BOX: u8 = 2;
const PRIORITY_PUBLIC: u8 = 1;

/// Driver-owned sentinel marking a page-heap region. Forwarded opaquely.
const PAGE_REGION_CONFIG: u32 = 1;

const PERIPH_BITBAND_ALIAS_START: u32 = 0x4200_0000;
const PERIPH_BITBAND_ALIAS_END: u32 = 0x43FF_FFFF;
const PERIPH_BITBAND_BASE: u32 = 0x4000_0000;
const SRAM_BITBAND_ALIAS_START: u32 = 0x2200_0000;
const SRAM_BITBAND_ALIAS_END: u32 = 0x23FF_FFFF;
const SRAM_BITBAND_BASE: u32 = 0x2000_0000;

/// Translate a bit-band alias to the address it aliases.
///
/// Each word in an alias window maps to one bit of the corresponding
/// physical region, so the alias offset shrinks by a factor of 32.
/// Addresses outside both windows pass through unchanged.
pub fn bitband_alias_to_address(addr: u32) -> u32 {
    if (PERIPH_BITBAND_ALIAS_START..=PERIPH_BITBAND_ALIAS_END).contains(&addr) {
        PERIPH_BITBAND_BASE + (addr - PERIPH_BITBAND_ALIAS_START) / 32
    } else if (SRAM_BITBAND_ALIAS_START..=SRAM_BITBAND_ALIAS_END).contains(&addr) {
        SRAM_BITBAND_BASE + (addr - SRAM_BITBAND_ALIAS_START) / 32
    } else {
        addr
    }
}

/// Box bring-up order. Currently the identity permutation; this is the hook
/// where a residency-driven ordering would go. Whatever the policy becomes,
/// the public box must stay at position 0.
pub fn order_boxes(order: &mut [usize]) {
    for (index, slot) in order.iter_mut().enumerate() {
        *slot = index;
    }
}

/// The muxed system-exception entry point, as the architecture crate's
/// vector shim sees it. Implemented by [`Supervisor`]; object-safe so the
/// shim can hold it as a `&'static dyn` without knowing the driver types.
pub trait SysMuxHandler {
    /// Handle the active system exception. `Ok` carries the EXC_RETURN to
    /// resume with; `Err` means the core must halt.
    fn sys_mux(&self, exc_return: u32, msp_s: u32) -> Result<u32, FaultDescriptor>;
}

pub struct Supervisor<U: ProtectionUnit, P: PageAllocator, const NUM_SLOTS: usize> {
    unit: U,
    pages: P,
    map: MemoryMap,
    table: RegionTable,
    slots: SlotCache<NUM_SLOTS>,
    layout: SramLayout,
    active_box: Cell<u8>,
}

impl<U: ProtectionUnit, P: PageAllocator, const NUM_SLOTS: usize> Supervisor<U, P, NUM_SLOTS> {
    pub fn new(unit: U, pages: P, map: MemoryMap) -> Supervisor<U, P, NUM_SLOTS> {
        Supervisor {
            unit,
            pages,
            layout: SramLayout::new(map.bss_boxes_start),
            map,
            table: RegionTable::new(),
            slots: SlotCache::new(),
            active_box: Cell::new(0),
        }
    }

    /// Id of the box currently executing.
    pub fn active_box(&self) -> u8 {
        self.active_box.get()
    }

    /// Record the executing box. Call-gate use only; [`switch_box`] keeps
    /// this in step on its own.
    ///
    /// [`switch_box`]: Supervisor::switch_box
    pub fn set_active_box(&self, box_id: u8) {
        self.active_box.set(box_id);
    }

    /// Register one static ACL for `box_id`, as parsed out of its
    /// configuration block. Init-only.
    pub fn add_static_region(
        &mut self,
        box_id: u8,
        start: u32,
        size: u32,
        acl: AclWord,
        config: u32,
    ) -> Result<(), RegionError> {
        self.table.add_static_region(box_id, start, size, acl, config)
    }

    /// Carve stack and bss SRAM for `box_id` and register both regions.
    ///
    /// Must be the first registration for a non-public box so its stack
    /// lands at region index 0, where [`switch_box`] expects it.
    ///
    /// [`switch_box`]: Supervisor::switch_box
    pub fn acl_sram(
        &mut self,
        box_id: u8,
        bss_size: u32,
        stack_size: u32,
    ) -> Result<BoxSram, RegionError> {
        if bss_size == 0 {
            return Err(RegionError::EmptyRegion);
        }
        let carved = self.layout.carve(bss_size, stack_size);
        self.table.add_static_region(
            box_id,
            carved.stack_start,
            carved.stack_size,
            AclWord::stack_default(),
            0,
        )?;
        self.table.add_static_region(
            box_id,
            carved.bss_start,
            carved.bss_size,
            AclWord::data_default(),
            0,
        )?;
        Ok(BoxSram {
            bss_start: carved.bss_start,
            stack_top: carved.stack_top,
        })
    }

    /// One-time hardware bring-up: enable the fault exceptions and pin the
    /// public windows into the static slots, then freeze them.
    pub fn arch_init(&mut self) -> Result<(), SlotError> {
        self.unit.enable_fault_exceptions();

        let map = self.map;
        // Public flash below the veneers.
        self.slots.set_static(
            0,
            Region::new(
                map.flash_start,
                map.entry_points_start - map.flash_start,
                AclWord::user_rwx(),
                0,
            ),
            &self.unit,
        )?;
        // The secure-gateway veneer window.
        self.slots.set_static(
            1,
            Region::new(
                map.entry_points_start,
                map.entry_points_end - map.entry_points_start,
                AclWord::entry_points(),
                0,
            ),
            &self.unit,
        )?;
        // Rest of flash.
        self.slots.set_static(
            2,
            Region::new(
                map.entry_points_end,
                map.flash_end - map.entry_points_end,
                AclWord::user_rwx(),
                0,
            ),
            &self.unit,
        )?;
        // Public SRAM above the page heap.
        self.slots.set_static(
            3,
            Region::new(
                map.page_end,
                map.sram_end - map.page_end,
                AclWord::user_rwx(),
                0,
            ),
            &self.unit,
        )?;

        self.slots.lock();
        self.unit.sync();
        Ok(())
    }

    /// Pre-check an access for call-gate code: the ACL word covering
    /// `[addr, addr + size)` in the active or public box, or 0 if denied.
    pub fn find_acl(&self, addr: u32, size: u32) -> u32 {
        // FIXME: use a secure-access ACL for the SCR instead of this
        // blanket user grant.
        if addr == U::SCR_ADDRESS {
            return AclWord::user_rw().get();
        }

        let addr = bitband_alias_to_address(addr);
        match self.find_region(addr) {
            Some(region) if region.covers(addr, size) => region.acl().get(),
            _ => 0,
        }
    }

    /// Search the active box first, then the public box.
    fn find_region(&self, addr: u32) -> Option<Region> {
        let active = self.active_box.get();
        if active != 0 {
            if let Some(region) = self.table.find_for_address(active, addr) {
                return Some(region);
            }
        }
        self.table.find_for_address(0, addr)
    }

    fn push_page(&self, page: ActivePage) -> bool {
        let region = Region::new(
            page.start,
            page.end - page.start,
            AclWord::empty(),
            PAGE_REGION_CONFIG,
        );
        self.slots.push(region, PRIORITY_PAGE, &self.unit)
    }

    fn push_active_pages(&self) {
        self.pages
            .for_each_active_page(Direction::Forward, &mut |page| self.push_page(page));
    }

    /// Try to make the faulting access at `fault_addr` transparent.
    ///
    /// The stacked PC travels along for tracing but is untrusted and never
    /// drives a decision.
    fn recover_fault(&self, _pc: u32, fault_addr: u32) -> bool {
        self.slots.begin_burst();

        // The sleep-control register is the one SCB word boxes may poke.
        // FIXME: use a secure-access ACL for the SCR.
        if fault_addr == U::SCR_ADDRESS {
            let region = Region::new(fault_addr, 4, AclWord::user_rw(), 0);
            return self.slots.push(region, PRIORITY_RECOVERY, &self.unit);
        }

        let addr = bitband_alias_to_address(fault_addr);

        if let Some(page) = self.pages.active_region_for_address(addr) {
            self.pages.register_fault(page.page);
            return self.push_page(page);
        }

        let region = match self.find_region(addr) {
            Some(region) => region,
            None => return false,
        };
        // The faulting word must fit entirely; a hit on the last bytes of a
        // region is a straddle, not an access the ACL covers.
        if !region.covers(addr, 4) {
            return false;
        }
        self.slots.push(region, PRIORITY_RECOVERY, &self.unit)
    }

    /// Reload the protection slots for an incoming box.
    ///
    /// `src_box` is advisory, kept for tracing. The order is deliberate:
    /// the inbound stack/context block must be resident before any box code
    /// runs, heap pages are shared by every box, box-local ACLs can be
    /// re-faulted in, and the public ACLs are the cheapest of all to lose.
    pub fn switch_box(&self, src_box: u8, dst_box: u8) {
        debug!("vmpu: switch box {} -> box {}", src_box, dst_box);

        self.slots.invalidate(&self.unit);

        let mut remaining: &[Region] = &[];
        if dst_box != 0 {
            let regions = self.table.get_for_box(dst_box);
            if let Some((stack, rest)) = regions.split_first() {
                self.slots.push(*stack, PRIORITY_STACK, &self.unit);
                remaining = rest;
            }
        }

        self.push_active_pages();

        for region in remaining {
            if !self.slots.push(*region, PRIORITY_BOX, &self.unit) {
                break;
            }
        }

        if dst_box == 0 {
            for region in self.table.get_for_box(0) {
                if !self.slots.push(*region, PRIORITY_PUBLIC, &self.unit) {
                    break;
                }
            }
        }

        self.unit.sync();
        self.active_box.set(dst_box);
    }

    fn dispatch(&self, exc_return: u32, msp_s: u32) -> Result<u32, FaultDescriptor> {
        let number = ((self.unit.cpu_ipsr() & 0x1ff) as i32) - NVIC_OFFSET;
        let sp = self.unit.sp_for(exc_return, msp_s);
        let kind = ExceptionKind::from_exception_number(number);

        match kind {
            Some(ExceptionKind::SecureFault) => {
                let status = self.unit.secure_fault_status();
                if status & (SFSR_AUVIOL | SFSR_SFARVALID) == (SFSR_AUVIOL | SFSR_SFARVALID) {
                    let pc = self.unit.read_frame_word(sp, FRAME_PC_WORD);
                    let fault_addr = self.unit.secure_fault_address();
                    if self.recover_fault(pc, fault_addr) {
                        self.unit.secure_fault_clear(status);
                        self.unit.sync();
                        // Resume at the faulting instruction and retry.
                        return Ok(exc_return);
                    }
                }
                Err(FaultDescriptor::new(
                    kind,
                    HaltReason::PermissionDenied,
                    exc_return,
                    sp,
                ))
            }
            Some(
                ExceptionKind::HardFault
                | ExceptionKind::MemManage
                | ExceptionKind::BusFault
                | ExceptionKind::UsageFault
                | ExceptionKind::DebugMonitor,
            ) => Err(FaultDescriptor::new(
                kind,
                HaltReason::Unrecoverable,
                exc_return,
                sp,
            )),
            Some(
                ExceptionKind::NonMaskableInt
                | ExceptionKind::SVCall
                | ExceptionKind::PendSV
                | ExceptionKind::SysTick,
            ) => Err(FaultDescriptor::new(
                kind,
                HaltReason::NotImplemented,
                exc_return,
                sp,
            )),
            None => Err(FaultDescriptor::new(
                None,
                HaltReason::NotASystemInterrupt(number),
                exc_return,
                sp,
            )),
        }
    }
}

impl<U: ProtectionUnit, P: PageAllocator, const NUM_SLOTS: usize> SysMuxHandler
    for Supervisor<U, P, NUM_SLOTS>
{
    fn sys_mux(&self, exc_return: u32, msp_s: u32) -> Result<u32, FaultDescriptor> {
        self.dispatch(exc_return, msp_s)
    }
}

impl<U: ProtectionUnit, P: PageAllocator, const NUM_SLOTS: usize> fmt::Display
    for Supervisor<U, P, NUM_SLOTS>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\r\nvMPU state: active box {}, {} boxes configured",
            self.active_box.get(),
            self.table.box_count()
        )?;
        fmt::Display::fmt(&self.slots, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::TrustAcl;
    use crate::platform::protection::FRAME_WORDS;
    use crate::slots::STATIC_SLOTS;

    const SLOTS: usize = 16;
    const EXC_RETURN_NS_THREAD: u32 = 0xffff_ffbc;
    const MSP_S: u32 = 0x3000_0800;

    struct MockUnit {
        ipsr: Cell<u32>,
        sfsr: Cell<u32>,
        sfar: Cell<u32>,
        cleared: Cell<Option<u32>>,
        frame_pc: Cell<u32>,
        syncs: Cell<usize>,
    }

    impl MockUnit {
        fn new() -> MockUnit {
            MockUnit {
                ipsr: Cell::new(0),
                sfsr: Cell::new(0),
                sfar: Cell::new(0),
                cleared: Cell::new(None),
                frame_pc: Cell::new(0x0000_1234),
                syncs: Cell::new(0),
            }
        }

        /// Arm the mock with a pending SecureFault at `addr`.
        fn raise_secure_fault(&self, addr: u32) {
            self.ipsr.set((NVIC_OFFSET - 9) as u32);
            self.sfsr.set(SFSR_AUVIOL | SFSR_SFARVALID);
            self.sfar.set(addr);
            self.cleared.set(None);
        }
    }

    impl ProtectionUnit for MockUnit {
        fn mpu_set(&self, _slot: usize, _region: &Region) {}
        fn mpu_invalidate(&self) {}
        fn sau_set(&self, _slot: usize, _region: &Region) {}
        fn sync(&self) {
            self.syncs.set(self.syncs.get() + 1);
        }
        fn read_frame_word(&self, _sp: u32, word_offset: usize) -> u32 {
            if word_offset >= FRAME_WORDS {
                return 0;
            }
            if word_offset == FRAME_PC_WORD {
                self.frame_pc.get()
            } else {
                0
            }
        }
        fn cpu_ipsr(&self) -> u32 {
            self.ipsr.get()
        }
        fn sp_for(&self, _exc_return: u32, msp_s: u32) -> u32 {
            msp_s
        }
        fn secure_fault_status(&self) -> u32 {
            self.sfsr.get()
        }
        fn secure_fault_address(&self) -> u32 {
            self.sfar.get()
        }
        fn secure_fault_clear(&self, status: u32) {
            self.cleared.set(Some(status));
        }
        fn enable_fault_exceptions(&self) {}
    }

    struct FixedPages {
        pages: [Option<ActivePage>; 4],
        last_fault: Cell<Option<u8>>,
        fault_count: Cell<usize>,
    }

    impl FixedPages {
        fn none() -> FixedPages {
            FixedPages {
                pages: [None; 4],
                last_fault: Cell::new(None),
                fault_count: Cell::new(0),
            }
        }

        fn with(pages: &[ActivePage]) -> FixedPages {
            let mut fixed = FixedPages::none();
            for (slot, page) in fixed.pages.iter_mut().zip(pages.iter()) {
                *slot = Some(*page);
            }
            fixed
        }
    }

    impl PageAllocator for FixedPages {
        fn active_region_for_address(&self, addr: u32) -> Option<ActivePage> {
            self.pages
                .iter()
                .flatten()
                .find(|page| addr >= page.start && addr < page.end)
                .copied()
        }

        fn register_fault(&self, page: u8) {
            self.last_fault.set(Some(page));
            self.fault_count.set(self.fault_count.get() + 1);
        }

        fn for_each_active_page(
            &self,
            direction: Direction,
            visitor: &mut dyn FnMut(ActivePage) -> bool,
        ) {
            let visit = |page: &Option<ActivePage>| match page {
                Some(page) => visitor(*page),
                None => true,
            };
            let keep_going = match direction {
                Direction::Forward => self.pages.iter().all(visit),
                Direction::Backward => self.pages.iter().rev().all(visit),
            };
            let _ = keep_going;
        }
    }

    fn memory_map() -> MemoryMap {
        MemoryMap {
            flash_start: 0x0000_0000,
            flash_end: 0x0010_0000,
            entry_points_start: 0x0000_f000,
            entry_points_end: 0x0001_0000,
            page_end: 0x2000_8000,
            sram_end: 0x2001_0000,
            bss_boxes_start: 0x2000_0000,
        }
    }

    fn supervisor_with(pages: FixedPages) -> Supervisor<MockUnit, FixedPages, SLOTS> {
        Supervisor::new(MockUnit::new(), pages, memory_map())
    }

    fn dynamic_region_starts(sup: &Supervisor<MockUnit, FixedPages, SLOTS>) -> [Option<u32>; SLOTS] {
        let mut starts = [None; SLOTS];
        for (i, slot) in starts.iter_mut().enumerate().skip(STATIC_SLOTS) {
            *slot = sup.slots.get(i).map(|entry| entry.region.start());
        }
        starts
    }

    #[test]
    fn find_acl_returns_the_covering_regions_word() {
        let mut sup = supervisor_with(FixedPages::none());
        let acl = AclWord::user_rw();
        sup.add_static_region(0, 0x4000_0000, 0x1000, acl, 0).unwrap();

        assert_eq!(sup.find_acl(0x4000_0000, 4), acl.get());
        assert_eq!(sup.find_acl(0x4000_0ffc, 4), acl.get());
        assert_eq!(sup.find_acl(0x4000_0800, 0x800), acl.get());
    }

    #[test]
    fn find_acl_denies_uncovered_and_straddling_accesses() {
        let mut sup = supervisor_with(FixedPages::none());
        sup.add_static_region(0, 0x4000_0000, 0x1000, AclWord::user_rw(), 0)
            .unwrap();

        assert_eq!(sup.find_acl(0x5000_0000, 4), 0);
        // Access runs past the region end.
        assert_eq!(sup.find_acl(0x4000_0ffd, 4), 0);
        assert_eq!(sup.find_acl(0x4000_0800, 0x1000), 0);
    }

    #[test]
    fn find_acl_translates_bitband_aliases() {
        let mut sup = supervisor_with(FixedPages::none());
        sup.add_static_region(0, 0x2000_0000, 0x1000, AclWord::data_default(), 0)
            .unwrap();
        sup.add_static_region(0, 0x4000_0000, 0x1000, AclWord::user_rw(), 0)
            .unwrap();

        // SRAM alias word 0x2200_0040 aliases bit 0 of 0x2000_0002.
        assert_eq!(
            sup.find_acl(0x2200_0040, 4),
            sup.find_acl(0x2000_0002, 4)
        );
        assert_ne!(sup.find_acl(0x2200_0040, 4), 0);

        // Peripheral alias 0x4200_2000 aliases a bit of 0x4000_0100.
        assert_eq!(
            sup.find_acl(0x4200_2000, 4),
            sup.find_acl(0x4000_0100, 4)
        );
    }

    #[test]
    fn find_acl_prefers_the_active_box() {
        let mut sup = supervisor_with(FixedPages::none());
        sup.add_static_region(0, 0x2000_8000, 0x1000, AclWord::user_rwx(), 0)
            .unwrap();
        sup.add_static_region(1, 0x4000_0000, 0x1000, AclWord::user_rw(), 0)
            .unwrap();

        sup.set_active_box(1);
        assert_eq!(sup.find_acl(0x4000_0010, 4), AclWord::user_rw().get());
        // The public window stays reachable from box 1.
        assert_eq!(sup.find_acl(0x2000_8010, 4), AclWord::user_rwx().get());

        sup.set_active_box(0);
        assert_eq!(sup.find_acl(0x4000_0010, 4), 0);
    }

    #[test]
    fn scr_access_gets_the_blanket_grant() {
        let sup = supervisor_with(FixedPages::none());
        let acl = sup.find_acl(0xe000_ed10, 4);
        assert_eq!(acl, AclWord::user_rw().get());
        assert_ne!(acl, 0);
    }

    #[test]
    fn secure_fault_installs_region_and_resumes() {
        let mut sup = supervisor_with(FixedPages::none());
        sup.add_static_region(0, 0x2000_8000, 0x1000, AclWord::user_rwx(), 0)
            .unwrap();
        sup.acl_sram(1, 64, 1024).unwrap();
        sup.acl_sram(2, 64, 1024).unwrap();
        sup.add_static_region(2, 0x4000_0000, 0x1000, AclWord::user_rw(), 0)
            .unwrap();
        sup.set_active_box(2);

        sup.unit.raise_secure_fault(0x4000_0100);
        let result = sup.sys_mux(EXC_RETURN_NS_THREAD, MSP_S);

        assert_eq!(result, Ok(EXC_RETURN_NS_THREAD));
        assert_eq!(sup.unit.cleared.get(), Some(SFSR_AUVIOL | SFSR_SFARVALID));
        assert!(sup.unit.syncs.get() > 0);

        let entry = sup.slots.get(STATIC_SLOTS).unwrap();
        assert_eq!(entry.region.start(), 0x4000_0000);
        assert_eq!(entry.region.end(), 0x4000_1000);
        assert_eq!(entry.priority, PRIORITY_RECOVERY);
    }

    #[test]
    fn scr_fault_synthesizes_a_grant() {
        let sup = supervisor_with(FixedPages::none());
        sup.unit.raise_secure_fault(0xe000_ed10);

        assert_eq!(
            sup.sys_mux(EXC_RETURN_NS_THREAD, MSP_S),
            Ok(EXC_RETURN_NS_THREAD)
        );
        let entry = sup.slots.get(STATIC_SLOTS).unwrap();
        assert_eq!(entry.region.start(), 0xe000_ed10);
        assert_eq!(entry.region.end(), 0xe000_ed14);
        assert!(entry.region.acl().is_set(TrustAcl::UREAD));
        assert!(entry.region.acl().is_set(TrustAcl::UWRITE));
    }

    #[test]
    fn bitband_fault_installs_the_aliased_region() {
        let mut sup = supervisor_with(FixedPages::none());
        sup.add_static_region(0, 0x2000_0000, 0x1000, AclWord::data_default(), 0)
            .unwrap();

        // Alias of bit 0 of 0x2000_0002.
        sup.unit.raise_secure_fault(0x2200_0040);
        assert_eq!(
            sup.sys_mux(EXC_RETURN_NS_THREAD, MSP_S),
            Ok(EXC_RETURN_NS_THREAD)
        );

        let entry = sup.slots.get(STATIC_SLOTS).unwrap();
        assert!(entry.region.contains(0x2000_0002));
    }

    #[test]
    fn page_fault_registers_and_installs_the_page() {
        let pages = FixedPages::with(&[ActivePage {
            start: 0x2000_4000,
            end: 0x2000_4400,
            page: 3,
        }]);
        let sup = supervisor_with(pages);

        sup.unit.raise_secure_fault(0x2000_4100);
        assert_eq!(
            sup.sys_mux(EXC_RETURN_NS_THREAD, MSP_S),
            Ok(EXC_RETURN_NS_THREAD)
        );

        assert_eq!(sup.pages.last_fault.get(), Some(3));
        let entry = sup.slots.get(STATIC_SLOTS).unwrap();
        assert_eq!(entry.region.start(), 0x2000_4000);
        assert_eq!(entry.region.config(), PAGE_REGION_CONFIG);
        assert_eq!(entry.priority, PRIORITY_PAGE);
    }

    #[test]
    fn uncovered_fault_is_a_permission_denial() {
        let mut sup = supervisor_with(FixedPages::none());
        sup.add_static_region(0, 0x2000_8000, 0x1000, AclWord::user_rwx(), 0)
            .unwrap();

        sup.unit.raise_secure_fault(0x5000_0000);
        let fault = sup.sys_mux(EXC_RETURN_NS_THREAD, MSP_S).unwrap_err();

        assert_eq!(fault.kind, Some(ExceptionKind::SecureFault));
        assert_eq!(fault.reason, HaltReason::PermissionDenied);
        assert_eq!(fault.exc_return, EXC_RETURN_NS_THREAD);
        assert!(sup.unit.cleared.get().is_none());
    }

    #[test]
    fn secure_fault_without_a_valid_address_halts() {
        let sup = supervisor_with(FixedPages::none());
        sup.unit.ipsr.set((NVIC_OFFSET - 9) as u32);
        // AUVIOL alone: SFAR contents are stale, nothing to recover.
        sup.unit.sfsr.set(SFSR_AUVIOL);
        sup.unit.sfar.set(0x2000_8000);

        let fault = sup.sys_mux(EXC_RETURN_NS_THREAD, MSP_S).unwrap_err();
        assert_eq!(fault.reason, HaltReason::PermissionDenied);
    }

    #[test]
    fn fatal_fault_classes_halt() {
        let sup = supervisor_with(FixedPages::none());

        sup.unit.ipsr.set((NVIC_OFFSET - 13) as u32);
        let fault = sup.sys_mux(EXC_RETURN_NS_THREAD, MSP_S).unwrap_err();
        assert_eq!(fault.kind, Some(ExceptionKind::HardFault));
        assert_eq!(fault.reason, HaltReason::Unrecoverable);

        sup.unit.ipsr.set((NVIC_OFFSET - 4) as u32);
        let fault = sup.sys_mux(EXC_RETURN_NS_THREAD, MSP_S).unwrap_err();
        assert_eq!(fault.kind, Some(ExceptionKind::DebugMonitor));
        assert_eq!(fault.reason, HaltReason::Unrecoverable);
    }

    #[test]
    fn unhandled_vectors_halt() {
        let sup = supervisor_with(FixedPages::none());

        sup.unit.ipsr.set((NVIC_OFFSET - 1) as u32);
        let fault = sup.sys_mux(EXC_RETURN_NS_THREAD, MSP_S).unwrap_err();
        assert_eq!(fault.kind, Some(ExceptionKind::SysTick));
        assert_eq!(fault.reason, HaltReason::NotImplemented);

        // An external interrupt has no business in the system mux.
        sup.unit.ipsr.set(40);
        let fault = sup.sys_mux(EXC_RETURN_NS_THREAD, MSP_S).unwrap_err();
        assert_eq!(fault.kind, None);
        assert_eq!(fault.reason, HaltReason::NotASystemInterrupt(24));

        // Reserved slot between SVCall and DebugMonitor.
        sup.unit.ipsr.set(13);
        let fault = sup.sys_mux(EXC_RETURN_NS_THREAD, MSP_S).unwrap_err();
        assert_eq!(fault.reason, HaltReason::NotASystemInterrupt(-3));
    }

    #[test]
    fn repeated_fault_recovers_identically() {
        let mut sup = supervisor_with(FixedPages::none());
        sup.add_static_region(0, 0x4000_0000, 0x1000, AclWord::user_rw(), 0)
            .unwrap();

        sup.unit.raise_secure_fault(0x4000_0010);
        let first = sup.sys_mux(EXC_RETURN_NS_THREAD, MSP_S);
        sup.unit.raise_secure_fault(0x4000_0010);
        let second = sup.sys_mux(EXC_RETURN_NS_THREAD, MSP_S);

        assert_eq!(first, second);
        // Same region lands in consecutive slots as the cursor advances.
        let a = sup.slots.get(STATIC_SLOTS).unwrap();
        let b = sup.slots.get(STATIC_SLOTS + 1).unwrap();
        assert_eq!(a.region, b.region);
        assert_eq!(a.priority, b.priority);
    }

    #[test]
    fn switch_to_public_box_reloads_pages_then_public_acls() {
        let pages = FixedPages::with(&[
            ActivePage {
                start: 0x2000_4000,
                end: 0x2000_4400,
                page: 0,
            },
            ActivePage {
                start: 0x2000_4400,
                end: 0x2000_4800,
                page: 1,
            },
        ]);
        let mut sup = supervisor_with(pages);

        // Box 0: five public regions.
        for i in 0..5u32 {
            sup.add_static_region(0, 0x0800_0000 + i * 0x1000, 0x1000, AclWord::user_rwx(), 0)
                .unwrap();
        }
        // Box 1: stack + bss + one peripheral window.
        sup.acl_sram(1, 64, 1024).unwrap();
        sup.add_static_region(1, 0x4000_0000, 0x1000, AclWord::user_rw(), 0)
            .unwrap();
        sup.set_active_box(1);

        sup.switch_box(1, 0);

        let starts = dynamic_region_starts(&sup);
        assert_eq!(starts[STATIC_SLOTS], Some(0x2000_4000));
        assert_eq!(starts[STATIC_SLOTS + 1], Some(0x2000_4400));
        for i in 0..5usize {
            assert_eq!(
                starts[STATIC_SLOTS + 2 + i],
                Some(0x0800_0000 + (i as u32) * 0x1000)
            );
        }
        assert_eq!(starts[STATIC_SLOTS + 7], None);
        assert_eq!(sup.slots.cursor(), STATIC_SLOTS + 7);
        assert_eq!(sup.active_box(), 0);

        // No box-1 region survived the switch.
        assert!(sup
            .slots
            .dynamic_iter()
            .all(|entry| entry.region.start() != 0x4000_0000));

        let pages_priorities: [u8; 2] = [
            sup.slots.get(STATIC_SLOTS).unwrap().priority,
            sup.slots.get(STATIC_SLOTS + 1).unwrap().priority,
        ];
        assert_eq!(pages_priorities, [PRIORITY_PAGE, PRIORITY_PAGE]);
        assert_eq!(
            sup.slots.get(STATIC_SLOTS + 2).unwrap().priority,
            PRIORITY_PUBLIC
        );
    }

    #[test]
    fn switch_to_a_box_maps_its_stack_first() {
        let pages = FixedPages::with(&[ActivePage {
            start: 0x2000_4000,
            end: 0x2000_4400,
            page: 0,
        }]);
        let mut sup = supervisor_with(pages);

        sup.add_static_region(0, 0x0800_0000, 0x1000, AclWord::user_rwx(), 0)
            .unwrap();
        let sram = sup.acl_sram(1, 64, 1024).unwrap();
        sup.add_static_region(1, 0x4000_0000, 0x1000, AclWord::user_rw(), 0)
            .unwrap();

        sup.switch_box(0, 1);

        // Stack/context first, at top priority.
        let stack = sup.slots.get(STATIC_SLOTS).unwrap();
        assert!(stack.region.acl().is_set(TrustAcl::STACK));
        assert_eq!(stack.region.end(), sram.stack_top);
        assert_eq!(stack.priority, PRIORITY_STACK);

        // Then the heap page, then the rest of the box's regions.
        assert_eq!(
            sup.slots.get(STATIC_SLOTS + 1).unwrap().region.start(),
            0x2000_4000
        );
        assert_eq!(
            sup.slots.get(STATIC_SLOTS + 2).unwrap().region.start(),
            sram.bss_start
        );
        assert_eq!(
            sup.slots.get(STATIC_SLOTS + 3).unwrap().region.start(),
            0x4000_0000
        );
        assert_eq!(sup.slots.get(STATIC_SLOTS + 3).unwrap().priority, PRIORITY_BOX);

        // Public ACLs are not preloaded for a non-public box.
        assert!(sup.slots.get(STATIC_SLOTS + 4).is_none());
        assert_eq!(sup.active_box(), 1);
    }

    #[test]
    fn arch_init_pins_the_public_windows() {
        let mut sup = supervisor_with(FixedPages::none());
        sup.arch_init().unwrap();

        let map = memory_map();
        let flash = sup.slots.get(0).unwrap().region;
        assert_eq!(flash.start(), map.flash_start);
        assert_eq!(flash.end(), map.entry_points_start);

        let veneers = sup.slots.get(1).unwrap().region;
        assert_eq!(veneers.start(), map.entry_points_start);
        assert!(veneers.acl().is_set(TrustAcl::NSCALLABLE));
        assert!(veneers.acl().is_set(TrustAcl::SEXECUTE));

        let rest = sup.slots.get(2).unwrap().region;
        assert_eq!(rest.end(), map.flash_end);

        let sram = sup.slots.get(3).unwrap().region;
        assert_eq!(sram.start(), map.page_end);
        assert_eq!(sram.end(), map.sram_end);

        assert!(sup.slots.is_locked());
        assert!(sup.unit.syncs.get() > 0);
    }

    #[test]
    fn acl_sram_returns_the_documented_extents() {
        let mut sup = supervisor_with(FixedPages::none());
        sup.add_static_region(0, 0x2000_8000, 0x1000, AclWord::user_rwx(), 0)
            .unwrap();

        let sram = sup.acl_sram(1, 200, 1024).unwrap();
        assert_eq!(sram.stack_top, 0x2000_0420);
        assert_eq!(sram.bss_start, 0x2000_0440);

        let regions = sup.table.get_for_box(1);
        assert_eq!(regions.len(), 2);
        assert!(regions[0].acl().is_set(TrustAcl::STACK));
        assert_eq!(regions[0].start(), 0x2000_0020);
        assert_eq!(regions[0].end(), 0x2000_0420);
        assert_eq!(regions[1].start(), 0x2000_0440);
        assert_eq!(regions[1].end(), 0x2000_0440 + 224);

        // The next box lands strictly above, separated by the guard bands.
        let next = sup.acl_sram(2, 64, 1024).unwrap();
        assert_eq!(next.stack_top - 1024, 0x2000_0440 + 224 + 32);

        assert_eq!(sup.acl_sram(3, 0, 1024), Err(RegionError::EmptyRegion));
    }

    /// Fixed-capacity sink so the state dump can be rendered without an
    /// allocator.
    struct DumpBuffer {
        bytes: [u8; 1024],
        len: usize,
    }

    impl DumpBuffer {
        fn new() -> DumpBuffer {
            DumpBuffer {
                bytes: [0; 1024],
                len: 0,
            }
        }

        fn as_str(&self) -> &str {
            core::str::from_utf8(&self.bytes[..self.len]).unwrap()
        }
    }

    impl fmt::Write for DumpBuffer {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let bytes = s.as_bytes();
            if self.len + bytes.len() > self.bytes.len() {
                return Err(fmt::Error);
            }
            self.bytes[self.len..self.len + bytes.len()].copy_from_slice(bytes);
            self.len += bytes.len();
            Ok(())
        }
    }

    #[test]
    fn state_dump_lists_boxes_and_slots() {
        let mut sup = supervisor_with(FixedPages::none());
        sup.add_static_region(0, 0x2000_8000, 0x1000, AclWord::user_rwx(), 0)
            .unwrap();
        sup.acl_sram(1, 64, 1024).unwrap();
        sup.set_active_box(1);

        let mut buf = DumpBuffer::new();
        fmt::write(&mut buf, format_args!("{}", sup)).unwrap();

        let dump = buf.as_str();
        assert!(dump.contains("active box 1"));
        assert!(dump.contains("2 boxes configured"));
        assert!(dump.contains("Slot  0 (static): Unused"));
    }

    #[test]
    fn order_boxes_is_the_identity() {
        let mut order = [0usize; 5];
        order_boxes(&mut order);
        assert_eq!(order, [0, 1, 2, 3, 4]);
        assert_eq!(order[0], 0);
    }

    #[test]
    fn bitband_translation_windows() {
        assert_eq!(bitband_alias_to_address(0x2200_0040), 0x2000_0002);
        assert_eq!(bitband_alias_to_address(0x2200_0000), 0x2000_0000);
        assert_eq!(bitband_alias_to_address(0x4200_2000), 0x4000_0100);
        // Outside the alias windows nothing is translated.
        assert_eq!(bitband_alias_to_address(0x2000_0040), 0x2000_0040);
        assert_eq!(bitband_alias_to_address(0x4400_0000), 0x4400_0000);
    }
}
