// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

#[macro_use]
extern crate log;

pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod dma;
pub mod irq;
pub mod keypad;
pub mod save;
pub mod sound;
pub mod timer;
pub mod video;

pub use bus::{Bus, BusDevice};
pub use cpu::Cpu;
pub use dma::{Dma, DmaTiming};
pub use irq::{Irq, IrqSource};
pub use keypad::{Key, Keypad};
pub use timer::Timers;

/// A bank of memory or mapped device accessible at 8/16/32-bit widths.
pub trait Addressable {
    fn read(&self, address: u32) -> u8;
    fn write(&mut self, address: u32, value: u8);
}
