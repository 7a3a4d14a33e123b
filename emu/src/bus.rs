// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! The unified memory bus: address decoding across BIOS, the two work-RAM
//! banks, the I/O register plane, palette, VRAM, OAM and the cartridge.

use gbacore_core::{IoRegs, MemBlock};

use crate::cartridge::Cartridge;
use crate::cpu::CpuBus;

pub const BIOS_SIZE: usize = 0x4000;
const BOARD_WRAM_SIZE: usize = 0x4_0000;
const CHIP_WRAM_SIZE: usize = 0x8000;
const PALETTE_SIZE: usize = 0x400;
const VRAM_SIZE: usize = 0x1_8000;
const OAM_SIZE: usize = 0x400;

/// Anything the bus needs to reach outside the memory map it owns: the
/// I/O register plane (driven by DMA/timer/video/sound monitors) and the
/// cartridge (ROM + save controller).
pub struct Bus {
    pub bios: MemBlock,
    pub board_wram: MemBlock,
    pub chip_wram: MemBlock,
    pub io: IoRegs,
    pub palette: MemBlock,
    pub vram: MemBlock,
    pub oam: MemBlock,
    pub cartridge: Cartridge,
    current_pc: u32,
    unused_value: u32,
}

pub trait BusDevice {
    fn read8(&self, addr: u32) -> u8;
    fn write8(&mut self, addr: u32, value: u8);
}

impl Bus {
    pub fn new(bios: Vec<u8>, cartridge: Cartridge) -> Self {
        let mut bios_block = MemBlock::new(BIOS_SIZE, false);
        bios_block.load(&bios, 0);
        Self {
            bios: bios_block,
            board_wram: MemBlock::new(BOARD_WRAM_SIZE, false),
            chip_wram: MemBlock::new(CHIP_WRAM_SIZE, false),
            io: IoRegs::new(),
            palette: MemBlock::new(PALETTE_SIZE, false),
            vram: MemBlock::new(VRAM_SIZE, false),
            oam: MemBlock::new(OAM_SIZE, false),
            cartridge,
            current_pc: 0,
            unused_value: 0,
        }
    }

    /// Called by the scheduler before each CPU step so BIOS reads can be
    /// gated on whether execution is actually inside the BIOS region.
    pub fn set_current_pc(&mut self, pc: u32) {
        self.current_pc = pc;
    }

    pub fn set_unused_value(&mut self, value: u32) {
        self.unused_value = value;
    }

    fn unused_read(&self, addr: u32, width: u32) -> u32 {
        let shift = (addr & 3) * 8;
        (self.unused_value >> shift) & ((1u64 << (width * 8)) - 1) as u32
    }

    fn read_bios(&self, addr: u32, width: u32) -> u32 {
        if self.current_pc >= BIOS_SIZE as u32 {
            return self.unused_read(addr, width);
        }
        match width {
            1 => u32::from(self.bios.read8(addr as usize)),
            2 => u32::from(self.bios.read16(addr as usize)),
            _ => self.bios.read32(addr as usize),
        }
    }

    fn read(&mut self, addr: u32, width: u32) -> u32 {
        match addr >> 24 {
            0x00 => self.read_bios(addr & 0x3fff, width),
            0x02 => {
                let off = (addr as usize) & (BOARD_WRAM_SIZE - 1);
                match width {
                    1 => u32::from(self.board_wram.read8(off)),
                    2 => u32::from(self.board_wram.read16(off)),
                    _ => self.board_wram.read32(off),
                }
            }
            0x03 => {
                let off = (addr as usize) & (CHIP_WRAM_SIZE - 1);
                match width {
                    1 => u32::from(self.chip_wram.read8(off)),
                    2 => u32::from(self.chip_wram.read16(off)),
                    _ => self.chip_wram.read32(off),
                }
            }
            0x04 => self.io.read(addr & 0x3ff, width as u8),
            0x05 => {
                let off = (addr as usize) & (PALETTE_SIZE - 1);
                match width {
                    1 => u32::from(self.palette.read16(off & !1)),
                    2 => u32::from(self.palette.read16(off)),
                    _ => self.palette.read32(off),
                }
            }
            0x06 => {
                let off = vram_mirror(addr as usize);
                match width {
                    1 => u32::from(self.vram.read16(off & !1)),
                    2 => u32::from(self.vram.read16(off)),
                    _ => self.vram.read32(off),
                }
            }
            0x07 => {
                let off = (addr as usize) & (OAM_SIZE - 1);
                match width {
                    1 => u32::from(self.oam.read16(off & !1)),
                    2 => u32::from(self.oam.read16(off)),
                    _ => self.oam.read32(off),
                }
            }
            0x08..=0x0c => self.cartridge.read(addr, width),
            0x0d => {
                if self.cartridge.is_eeprom() {
                    self.cartridge.read_save(addr, width)
                } else {
                    self.cartridge.read(addr, width)
                }
            }
            0x0e | 0x0f => self.cartridge.read_save(addr, width),
            _ => self.unused_read(addr, width),
        }
    }

    fn write(&mut self, addr: u32, width: u32, value: u32) {
        match addr >> 24 {
            0x00 => {}
            0x02 => {
                let off = (addr as usize) & (BOARD_WRAM_SIZE - 1);
                match width {
                    1 => self.board_wram.write8(off, value as u8),
                    2 => self.board_wram.write16(off, value as u16),
                    _ => self.board_wram.write32(off, value),
                }
            }
            0x03 => {
                let off = (addr as usize) & (CHIP_WRAM_SIZE - 1);
                match width {
                    1 => self.chip_wram.write8(off, value as u8),
                    2 => self.chip_wram.write16(off, value as u16),
                    _ => self.chip_wram.write32(off, value),
                }
            }
            0x04 => self.io.write(addr & 0x3ff, width as u8, value),
            0x05 => {
                let off = (addr as usize) & (PALETTE_SIZE - 1);
                match width {
                    1 => self.palette.write16(off & !1, (value as u16) * 0x0101),
                    2 => self.palette.write16(off, value as u16),
                    _ => self.palette.write32(off, value),
                }
            }
            0x06 => {
                let off = vram_mirror(addr as usize);
                match width {
                    1 => self.vram.write16(off & !1, (value as u16) * 0x0101),
                    2 => self.vram.write16(off, value as u16),
                    _ => self.vram.write32(off, value),
                }
            }
            0x07 => {
                // OAM rejects byte writes.
                if width >= 2 {
                    let off = (addr as usize) & (OAM_SIZE - 1);
                    if width == 2 {
                        self.oam.write16(off, value as u16);
                    } else {
                        self.oam.write32(off, value);
                    }
                }
            }
            0x08..=0x0d => {}
            0x0e | 0x0f => self.cartridge.write_save(addr, width, value),
            _ => {}
        }
    }
}

fn vram_mirror(addr: usize) -> usize {
    let masked = addr & 0x1ffff;
    if masked < VRAM_SIZE {
        masked
    } else {
        masked - 0x8000
    }
}

impl CpuBus for Bus {
    fn read8(&mut self, addr: u32) -> u8 {
        self.read(addr, 1) as u8
    }

    fn read16(&mut self, addr: u32) -> u16 {
        self.read(addr & !1, 2) as u16
    }

    fn read32(&mut self, addr: u32) -> u32 {
        self.read(addr & !3, 4)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        self.write(addr, 1, u32::from(value));
    }

    fn write16(&mut self, addr: u32, value: u16) {
        self.write(addr & !1, 2, u32::from(value));
    }

    fn write32(&mut self, addr: u32, value: u32) {
        self.write(addr & !3, 4, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Cartridge;

    fn make_bus() -> Bus {
        let bios = vec![0u8; BIOS_SIZE];
        Bus::new(bios, Cartridge::new(vec![0u8; 0x200], None))
    }

    #[test]
    fn board_wram_mirrors_beyond_capacity() {
        let mut bus = make_bus();
        bus.write8(0x0200_0000, 0xab);
        assert_eq!(0xab, bus.read8(0x0204_0000));
    }

    #[test]
    fn chip_wram_upper_mirror() {
        let mut bus = make_bus();
        bus.write8(0x0300_0000, 0x42);
        assert_eq!(0x42, bus.read8(0x03ff_8000));
    }

    #[test]
    fn oam_rejects_byte_writes() {
        let mut bus = make_bus();
        bus.write8(0x0700_0000, 0xff);
        assert_eq!(0, bus.read8(0x0700_0000));
    }

    #[test]
    fn palette_byte_write_duplicates_into_halfword() {
        let mut bus = make_bus();
        bus.write8(0x0500_0000, 0x7f);
        assert_eq!(0x7f7f, bus.read16(0x0500_0000));
    }

    #[test]
    fn bios_read_outside_bios_pc_returns_unused_value() {
        let mut bus = make_bus();
        bus.bios.write8(0, 0xaa);
        bus.set_current_pc(0x0800_0000);
        bus.set_unused_value(0xdead_beef);
        assert_eq!(0xdead_beef, bus.read32(0x0));
    }

    #[test]
    fn bios_read_inside_bios_pc_returns_contents() {
        let mut bus = make_bus();
        bus.bios.write8(0, 0xaa);
        bus.set_current_pc(0x10);
        assert_eq!(0xaa, bus.read8(0x0));
    }

    #[test]
    fn misaligned_word_read_rotates() {
        let mut bus = make_bus();
        bus.write32(0x0200_0000, 0x1122_3344);
        assert_eq!(0x4411_2233, bus.read32(0x0200_0001));
    }

    #[test]
    fn eeprom_window_routes_to_save_not_rom() {
        use crate::save::{Eeprom, SaveController};
        let mut bus = make_bus();
        bus.cartridge.save = SaveController::Eeprom(Eeprom::new(false));
        // Writing the 2-bit write command plus a 6-bit zero address plus 64
        // data bits plus a stop bit should land in EEPROM storage, not be
        // silently dropped as a ROM-region write.
        let mut bits = vec![true, true];
        bits.extend(std::iter::repeat(false).take(6));
        bits.extend(std::iter::repeat(true).take(64));
        bits.push(true);
        for bit in bits {
            bus.write16(0x0dff_ff00, u16::from(bit));
        }

        let mut read_bits = vec![true, false];
        read_bits.extend(std::iter::repeat(false).take(6));
        for bit in read_bits {
            bus.write16(0x0dff_ff00, u16::from(bit));
        }
        let mut saw_set_bit = false;
        for _ in 0..68 {
            if bus.read16(0x0dff_ff00) & 1 != 0 {
                saw_set_bit = true;
            }
        }
        assert!(saw_set_bit);
    }
}
