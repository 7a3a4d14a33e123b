// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! A bit-field-mapped I/O register plane.
//!
//! Each 4-byte-aligned address owns an ordered list of [`Slot`]s. A slot
//! claims a sub-range of the aligned word via a mask and shift, has its own
//! storage cell, and may observe reads and writes. The plane itself never
//! interprets register semantics; every side effect lives in a slot's
//! monitor closures.

use crate::util::{new_shared_cell, SharedCell};

/// Where a slot's bits live.
pub enum SlotStorage {
    /// A write-only trigger: writes are observed but nothing is stored.
    None,
    /// Bits are held in a shared cell, readable by other slots or owners.
    Cell(SharedCell<u32>),
}

impl SlotStorage {
    fn get(&self) -> u32 {
        match self {
            SlotStorage::None => 0,
            SlotStorage::Cell(cell) => cell.get(),
        }
    }

    fn set(&self, value: u32) {
        if let SlotStorage::Cell(cell) = self {
            cell.set(value);
        }
    }
}

type ReadMonitor = Box<dyn Fn(u32) -> u32>;
type PreWriteMonitor = Box<dyn FnMut(u32) -> Option<u32>>;
type PostWriteMonitor = Box<dyn FnMut(u32, u32)>;

/// A single bit-field within a 32-bit-aligned I/O register.
pub struct Slot {
    storage: SlotStorage,
    mask: u32,
    shift: u32,
    readable: bool,
    writable: bool,
    on_read: Option<ReadMonitor>,
    on_pre_write: Option<PreWriteMonitor>,
    on_post_write: Option<PostWriteMonitor>,
}

impl Slot {
    pub fn new(storage: SlotStorage, mask: u32, shift: u32) -> Self {
        Self {
            storage,
            mask,
            shift,
            readable: true,
            writable: true,
            on_read: None,
            on_pre_write: None,
            on_post_write: None,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    pub fn on_read(mut self, f: impl Fn(u32) -> u32 + 'static) -> Self {
        self.on_read = Some(Box::new(f));
        self
    }

    pub fn on_pre_write(mut self, f: impl FnMut(u32) -> Option<u32> + 'static) -> Self {
        self.on_pre_write = Some(Box::new(f));
        self
    }

    pub fn on_post_write(mut self, f: impl FnMut(u32, u32) + 'static) -> Self {
        self.on_post_write = Some(Box::new(f));
        self
    }

    /// Bit range this slot contributes within its aligned word, as `(mask << shift)`.
    pub fn field(&self) -> u32 {
        self.mask << self.shift
    }

    fn contribute(&self) -> u32 {
        if !self.readable {
            return 0;
        }
        let local = self.storage.get() & self.mask;
        let local = match &self.on_read {
            Some(f) => f(local) & self.mask,
            None => local,
        };
        local << self.shift
    }

    fn accept_write(&mut self, word_value: u32) {
        if !self.writable {
            return;
        }
        let incoming = (word_value >> self.shift) & self.mask;
        let accepted = match &mut self.on_pre_write {
            Some(f) => f(incoming),
            None => Some(incoming),
        };
        if let Some(new_local) = accepted {
            let old_local = self.storage.get() & self.mask;
            self.storage.set(new_local & self.mask);
            if let Some(f) = &mut self.on_post_write {
                f(old_local, new_local & self.mask);
            }
        }
    }
}

/// A 1 KiB logical I/O region addressed as 256 aligned 32-bit words.
pub struct IoRegs {
    words: Vec<Vec<Slot>>,
}

const WORD_COUNT: usize = 256;

impl Default for IoRegs {
    fn default() -> Self {
        Self::new()
    }
}

impl IoRegs {
    pub fn new() -> Self {
        Self {
            words: (0..WORD_COUNT).map(|_| Vec::new()).collect(),
        }
    }

    /// Registers a slot at the given byte address. Panics if the slot's bit
    /// range overlaps an existing slot in the same aligned word -- the plane
    /// must stay disjoint per word.
    pub fn add_slot(&mut self, addr: u32, slot: Slot) {
        let word_index = (addr as usize / 4) % WORD_COUNT;
        let field = slot.field();
        for existing in &self.words[word_index] {
            assert_eq!(
                existing.field() & field,
                0,
                "overlapping io slot at {:#06x}",
                addr & !3
            );
        }
        self.words[word_index].push(slot);
    }

    fn assemble(&self, word_index: usize) -> u32 {
        self.words[word_index]
            .iter()
            .fold(0u32, |acc, slot| acc | slot.contribute())
    }

    pub fn read(&self, addr: u32, width: u8) -> u32 {
        let word_index = (addr as usize / 4) % WORD_COUNT;
        let word = self.assemble(word_index);
        let bit_shift = (addr & 3) * 8;
        let value = word >> bit_shift;
        match width {
            1 => value & 0xff,
            2 => value & 0xffff,
            _ => value,
        }
    }

    pub fn write(&mut self, addr: u32, width: u8, value: u32) {
        let word_index = (addr as usize / 4) % WORD_COUNT;
        let bit_shift = (addr & 3) * 8;
        let (mask, shifted) = match width {
            1 => (0xffu32 << bit_shift, (value & 0xff) << bit_shift),
            2 => (0xffffu32 << bit_shift, (value & 0xffff) << bit_shift),
            _ => (0xffff_ffffu32, value),
        };
        for slot in &mut self.words[word_index] {
            if slot.field() & mask != 0 {
                slot.accept_write(shifted);
            }
        }
    }
}

pub fn slot_cell(initial: u32) -> SharedCell<u32> {
    new_shared_cell(initial)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_assembles_disjoint_slots() {
        let mut regs = IoRegs::new();
        let a = slot_cell(0);
        let b = slot_cell(0);
        regs.add_slot(0x000, Slot::new(SlotStorage::Cell(a.clone()), 0xff, 0));
        regs.add_slot(0x000, Slot::new(SlotStorage::Cell(b.clone()), 0xff, 8));
        a.set(0x12);
        b.set(0x34);
        assert_eq!(0x3412, regs.read(0x000, 2));
    }

    #[test]
    #[should_panic]
    fn overlapping_slots_panic() {
        let mut regs = IoRegs::new();
        regs.add_slot(
            0x004,
            Slot::new(SlotStorage::Cell(slot_cell(0)), 0xff, 0),
        );
        regs.add_slot(
            0x004,
            Slot::new(SlotStorage::Cell(slot_cell(0)), 0xff, 4),
        );
    }

    #[test]
    fn write_routes_only_overlapping_bytes() {
        let mut regs = IoRegs::new();
        let lo = slot_cell(0);
        let hi = slot_cell(0);
        regs.add_slot(0x008, Slot::new(SlotStorage::Cell(lo.clone()), 0xffff, 0));
        regs.add_slot(0x00a, Slot::new(SlotStorage::Cell(hi.clone()), 0xffff, 0));
        regs.write(0x008, 2, 0xbeef);
        assert_eq!(0xbeef, lo.get());
        assert_eq!(0x0000, hi.get());
    }

    #[test]
    fn pre_write_monitor_can_veto() {
        let mut regs = IoRegs::new();
        let cell = slot_cell(0);
        let slot = Slot::new(SlotStorage::Cell(cell.clone()), 0xff, 0)
            .on_pre_write(|incoming| if incoming == 0xff { None } else { Some(incoming) });
        regs.add_slot(0x010, slot);
        regs.write(0x010, 1, 0xff);
        assert_eq!(0, cell.get());
        regs.write(0x010, 1, 0x42);
        assert_eq!(0x42, cell.get());
    }

    #[test]
    fn write_only_slot_has_no_storage() {
        let mut regs = IoRegs::new();
        let mut seen = None;
        let slot = Slot::new(SlotStorage::None, 0xff, 0)
            .write_only()
            .on_pre_write(move |v| {
                seen.replace(v);
                Some(v)
            });
        regs.add_slot(0x014, slot);
        regs.write(0x014, 1, 0x7f);
        assert_eq!(0, regs.read(0x014, 1));
    }
}
