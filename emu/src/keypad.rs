// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! The keypad: 10 buttons mapped into KEYINPUT (active-low) and an optional
//! KEYCNT interrupt condition (any-pressed or all-pressed).

use gbacore_core::util::SharedCell;
use gbacore_core::{slot_cell, IoRegs, Slot, SlotStorage};

use crate::irq::{Irq, IrqSource};

const KEYINPUT_ADDR: u32 = 0x0130;
const KEYCNT_ADDR: u32 = 0x0132;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Key {
    A,
    B,
    Select,
    Start,
    Right,
    Left,
    Up,
    Down,
    R,
    L,
}

impl Key {
    fn bit(self) -> u16 {
        match self {
            Key::A => 0,
            Key::B => 1,
            Key::Select => 2,
            Key::Start => 3,
            Key::Right => 4,
            Key::Left => 5,
            Key::Up => 6,
            Key::Down => 7,
            Key::R => 8,
            Key::L => 9,
        }
    }
}

pub struct Keypad {
    keyinput: SharedCell<u32>,
    keycnt: SharedCell<u32>,
}

impl Keypad {
    pub fn new(io: &mut IoRegs) -> Self {
        let keyinput = slot_cell(0x03ff);
        let keycnt = slot_cell(0);
        io.add_slot(KEYINPUT_ADDR, Slot::new(SlotStorage::Cell(keyinput.clone()), 0x3ff, 0).read_only());
        io.add_slot(KEYCNT_ADDR, Slot::new(SlotStorage::Cell(keycnt.clone()), 0xffff, 16));
        Self { keyinput, keycnt }
    }

    pub fn set_pressed(&self, key: Key, pressed: bool) {
        let bit = 1u32 << key.bit();
        let current = self.keyinput.get();
        self.keyinput.set(if pressed { current & !bit } else { current | bit });
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.keyinput.get() & (1 << key.bit()) == 0
    }

    /// Evaluates KEYCNT's interrupt condition against the current key
    /// state and posts a Keypad IRQ if it fires.
    pub fn poll_irq(&self, irq: &Irq) {
        let keycnt = self.keycnt.get();
        if keycnt & (1 << 14) == 0 {
            return;
        }
        let mask = keycnt & 0x3ff;
        let pressed_mask = !self.keyinput.get() & 0x3ff;
        let fires = if keycnt & (1 << 15) != 0 {
            pressed_mask & mask == mask
        } else {
            pressed_mask & mask != 0
        };
        if fires {
            irq.request(IrqSource::Keypad);
        }
    }
}
