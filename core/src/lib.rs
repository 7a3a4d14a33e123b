// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

#[macro_use]
extern crate log;

pub mod io_regs;
pub mod mem_block;
pub mod util;

pub use io_regs::{slot_cell, IoRegs, Slot, SlotStorage};
pub use mem_block::MemBlock;
