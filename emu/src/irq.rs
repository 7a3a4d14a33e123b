// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! The interrupt controller: IE/IF/IME wired into the I/O plane, and the
//! pending/mask bookkeeping the scheduler polls once per instruction.

use gbacore_core::util::SharedCell;
use gbacore_core::{slot_cell, IoRegs, Slot, SlotStorage};

const IE_ADDR: u32 = 0x0200;
const IF_ADDR: u32 = 0x0202;
const IME_ADDR: u32 = 0x0208;
const ALL_SOURCES_MASK: u32 = 0x1fff;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IrqSource {
    VBlank,
    HBlank,
    VCounterMatch,
    Timer0Overflow,
    Timer1Overflow,
    Timer2Overflow,
    Timer3Overflow,
    SerialCommunication,
    Dma0,
    Dma1,
    Dma2,
    Dma3,
    Keypad,
}

impl IrqSource {
    fn bit(self) -> u32 {
        match self {
            IrqSource::VBlank => 0,
            IrqSource::HBlank => 1,
            IrqSource::VCounterMatch => 2,
            IrqSource::Timer0Overflow => 3,
            IrqSource::Timer1Overflow => 4,
            IrqSource::Timer2Overflow => 5,
            IrqSource::Timer3Overflow => 6,
            IrqSource::SerialCommunication => 7,
            IrqSource::Dma0 => 8,
            IrqSource::Dma1 => 9,
            IrqSource::Dma2 => 10,
            IrqSource::Dma3 => 11,
            IrqSource::Keypad => 12,
        }
    }
}

/// Interrupt enable/request/master-enable registers. Installed into the I/O
/// plane once at system construction; the cells are kept so the scheduler
/// can post requests without a bus round trip.
pub struct Irq {
    ie: SharedCell<u32>,
    iflags: SharedCell<u32>,
    ime: SharedCell<u32>,
}

impl Irq {
    pub fn new(io: &mut IoRegs) -> Self {
        let ie = slot_cell(0);
        let iflags = slot_cell(0);
        let ime = slot_cell(0);

        io.add_slot(IE_ADDR, Slot::new(SlotStorage::Cell(ie.clone()), ALL_SOURCES_MASK, 0));

        let if_write_back = iflags.clone();
        io.add_slot(
            IF_ADDR,
            Slot::new(SlotStorage::Cell(iflags.clone()), ALL_SOURCES_MASK, 16).on_pre_write(move |incoming| {
                let current = if_write_back.get();
                Some(current & !incoming)
            }),
        );

        io.add_slot(IME_ADDR, Slot::new(SlotStorage::Cell(ime.clone()), 0x1, 0));

        Self { ie, iflags, ime }
    }

    pub fn request(&self, source: IrqSource) {
        self.iflags.set(self.iflags.get() | (1 << source.bit()));
    }

    /// True when an enabled, unmasked interrupt is outstanding; the CPU
    /// should be asked to service it.
    pub fn should_interrupt_cpu(&self) -> bool {
        self.ime.get() & 1 != 0 && self.ready_sources() != 0
    }

    /// True when any enabled source is pending, regardless of IME -- the
    /// condition that wakes the CPU from a BIOS Halt.
    pub fn should_wake_halt(&self) -> bool {
        self.ready_sources() != 0
    }

    fn ready_sources(&self) -> u32 {
        self.ie.get() & self.iflags.get() & ALL_SOURCES_MASK
    }
}
