// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Cache of the hardware protection slots.
//!
//! The hardware has far fewer MPU/SAU entries than the boxes have regions,
//! so the supervisor treats the entries as a cache: a few slots are frozen
//! at init (public flash, veneers, public SRAM) and the rest are rewritten
//! on demand, round-robin, as faults and box switches call for regions. The
//! cache is the only writer of slot state; everything it knows is a copy of
//! a table region, so rewriting a slot can never invalidate a reference.

use core::cell::Cell;
use core::fmt;

use crate::platform::protection::ProtectionUnit;
use crate::region::Region;
use crate::utilities::cells::OptionalCell;

/// Slots `0..STATIC_SLOTS` are programmed once at init and never evicted.
pub const STATIC_SLOTS: usize = 4;

/// One programmed slot: the region copy and the priority its writer claimed.
///
/// Priority is advisory metadata only. It documents which residents matter
/// (255 box stack, 100 heap pages, 3 faulted region, 2 box ACLs, 1 public
/// ACLs) but never reorders evictions; the round-robin cursor alone decides
/// what gets overwritten, which is what guarantees forward progress under
/// repeated faults.
#[derive(Copy, Clone)]
pub struct SlotEntry {
    pub region: Region,
    pub priority: u8,
}

/// Error from the init-time slot calls.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotError {
    /// `set_static` after `lock()`.
    Locked,
    /// Index outside the static range.
    NotStatic,
}

pub struct SlotCache<const NUM_SLOTS: usize> {
    slots: [OptionalCell<SlotEntry>; NUM_SLOTS],
    /// Next dynamic slot to write.
    cursor: Cell<usize>,
    /// Whether the cursor wrapped during the current burst.
    wrapped: Cell<bool>,
    locked: Cell<bool>,
}

impl<const NUM_SLOTS: usize> SlotCache<NUM_SLOTS> {
    pub const fn new() -> SlotCache<NUM_SLOTS> {
        const EMPTY: OptionalCell<SlotEntry> = OptionalCell::empty();
        SlotCache {
            slots: [EMPTY; NUM_SLOTS],
            cursor: Cell::new(STATIC_SLOTS),
            wrapped: Cell::new(false),
            locked: Cell::new(false),
        }
    }

    /// Program one of the fixed slots. Init-only.
    pub fn set_static<U: ProtectionUnit>(
        &self,
        index: usize,
        region: Region,
        unit: &U,
    ) -> Result<(), SlotError> {
        if self.locked.get() {
            return Err(SlotError::Locked);
        }
        if index >= STATIC_SLOTS {
            return Err(SlotError::NotStatic);
        }
        unit.sau_set(index, &region);
        unit.mpu_set(index, &region);
        self.slots[index].set(SlotEntry {
            region,
            priority: u8::MAX,
        });
        Ok(())
    }

    /// Freeze the static slots.
    pub fn lock(&self) {
        self.locked.set(true);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }

    /// Forget every dynamic slot and disable its hardware entry. Also opens
    /// a fresh burst: the cursor returns to the first dynamic slot.
    pub fn invalidate<U: ProtectionUnit>(&self, unit: &U) {
        for slot in self.slots.iter().skip(STATIC_SLOTS) {
            slot.clear();
        }
        unit.mpu_invalidate();
        self.cursor.set(STATIC_SLOTS);
        self.wrapped.set(false);
    }

    /// Open a burst of pushes without touching slot contents. The fault
    /// path calls this on entry so one recovery's wrap cannot starve the
    /// next one.
    pub fn begin_burst(&self) {
        self.wrapped.set(false);
    }

    /// Write `region` into the next dynamic slot.
    ///
    /// Returns true while the burst still has room, including on the push
    /// that wraps the cursor; returns false, writing nothing, once the
    /// cursor has already wrapped this burst. Callers loop on the result to
    /// fill the cache with as many regions as fit.
    pub fn push<U: ProtectionUnit>(&self, region: Region, priority: u8, unit: &U) -> bool {
        if self.wrapped.get() {
            return false;
        }

        let index = self.cursor.get();
        unit.sau_set(index, &region);
        unit.mpu_set(index, &region);
        self.slots[index].set(SlotEntry { region, priority });

        let next = index + 1;
        if next >= NUM_SLOTS {
            self.cursor.set(STATIC_SLOTS);
            self.wrapped.set(true);
        } else {
            self.cursor.set(next);
        }
        true
    }

    pub fn get(&self, index: usize) -> Option<SlotEntry> {
        self.slots.get(index).and_then(|slot| slot.get())
    }

    /// Index the next push will write.
    pub fn cursor(&self) -> usize {
        self.cursor.get()
    }

    /// The dynamic entries in slot order, skipping empty slots.
    pub fn dynamic_iter(&self) -> impl Iterator<Item = SlotEntry> + '_ {
        self.slots
            .iter()
            .skip(STATIC_SLOTS)
            .filter_map(|slot| slot.get())
    }
}

impl<const NUM_SLOTS: usize> fmt::Display for SlotCache<NUM_SLOTS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\r\n Protection slots")?;
        for (index, slot) in self.slots.iter().enumerate() {
            let tag = if index < STATIC_SLOTS { "static" } else { "dyn" };
            match slot.get() {
                Some(entry) => write!(
                    f,
                    "\r\n  Slot {:2} ({}): {} prio={}",
                    index, tag, entry.region, entry.priority
                )?,
                None => write!(f, "\r\n  Slot {:2} ({}): Unused", index, tag)?,
            }
        }
        write!(f, "\r\n")
    }
}
