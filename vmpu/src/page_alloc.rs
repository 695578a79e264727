// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface to the external page allocator.
//!
//! Boxes can own pages from a shared heap carved out next to the static SRAM
//! pool. The allocator tracks which pages are live and for which box; the
//! supervisor only ever asks three questions, captured by the
//! [`PageAllocator`] trait, and maps the answers onto protection slots.

/// One live page, as reported by the allocator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ActivePage {
    /// First address of the page.
    pub start: u32,
    /// One past the last address of the page.
    pub end: u32,
    /// Allocator-assigned page number, echoed back in fault reports.
    pub page: u8,
}

/// Iteration order over the active pages.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// The allocator-side API the supervisor consumes.
pub trait PageAllocator {
    /// The active page covering `addr`, if any.
    fn active_region_for_address(&self, addr: u32) -> Option<ActivePage>;

    /// Record that `page` took a protection fault, for the allocator's
    /// eviction bookkeeping.
    fn register_fault(&self, page: u8);

    /// Visit every active page in the given order. The visitor returns
    /// `false` to stop early, mirroring the slot cache running out of room.
    fn for_each_active_page(&self, direction: Direction, visitor: &mut dyn FnMut(ActivePage) -> bool);
}
