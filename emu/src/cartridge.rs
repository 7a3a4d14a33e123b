// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! The cartridge: ROM plus whichever save controller the title uses, and the
//! GPIO-routed RTC where present.

use crate::save::{Eeprom, Flash, FlashKind, Gpio, Rtc, SaveController, SaveKind};

const WIDE_EEPROM_THRESHOLD: usize = 16 * 1024 * 1024;
const GPIO_BASE: u32 = 0x080000c4;
const GPIO_END: u32 = 0x080000ca;

pub struct Cartridge {
    rom: Vec<u8>,
    pub save: SaveController,
    pub rtc: Option<Rtc>,
    pub gpio: Gpio,
}

impl Cartridge {
    pub fn new(rom: Vec<u8>, save: Option<SaveController>) -> Self {
        Self {
            rom,
            save: save.unwrap_or(SaveController::None),
            rtc: None,
            gpio: Gpio::new(),
        }
    }

    pub fn with_sram(rom: Vec<u8>) -> Self {
        Self::new(rom, Some(SaveController::Sram(crate::save::Sram::new())))
    }

    pub fn with_flash(rom: Vec<u8>, kind: FlashKind) -> Self {
        Self::new(rom, Some(SaveController::Flash(Flash::new(kind))))
    }

    pub fn with_eeprom(rom: Vec<u8>) -> Self {
        let wide = rom.len() <= WIDE_EEPROM_THRESHOLD;
        Self::new(rom, Some(SaveController::Eeprom(Eeprom::new(wide))))
    }

    pub fn enable_rtc(&mut self, day_of_week_offset: u8) {
        self.rtc = Some(Rtc::new(day_of_week_offset));
    }

    pub fn rom_len(&self) -> usize {
        self.rom.len()
    }

    /// True when the save controller is EEPROM, which shares the upper ROM
    /// address page (0x0D000000-0x0DFFFFFF) with its serial data pin rather
    /// than living in the dedicated save window at 0x0E000000.
    pub fn is_eeprom(&self) -> bool {
        matches!(self.save, SaveController::Eeprom(_))
    }

    pub fn read(&self, addr: u32, width: u32) -> u32 {
        if self.rtc.is_some() && (GPIO_BASE..GPIO_END).contains(&addr) {
            return self.read_gpio(addr);
        }
        let off = (addr as usize) & 0x01ff_ffff;
        if off + 4 > self.rom.len() {
            return self.read_rom_padded(off, width);
        }
        match width {
            1 => u32::from(self.rom[off]),
            2 => u32::from(self.rom[off]) | (u32::from(self.rom[off + 1]) << 8),
            _ => {
                u32::from(self.rom[off])
                    | (u32::from(self.rom[off + 1]) << 8)
                    | (u32::from(self.rom[off + 2]) << 16)
                    | (u32::from(self.rom[off + 3]) << 24)
            }
        }
    }

    fn read_rom_padded(&self, off: usize, width: u32) -> u32 {
        let mut bytes = [0u8; 4];
        for (i, byte) in bytes.iter_mut().enumerate() {
            if let Some(&v) = self.rom.get(off + i) {
                *byte = v;
            }
        }
        let value = u32::from_le_bytes(bytes);
        match width {
            1 => value & 0xff,
            2 => value & 0xffff,
            _ => value,
        }
    }

    pub fn write(&mut self, _addr: u32, _width: u32, _value: u32) {
        // Cartridge ROM is not writable through the bus; GPIO writes route
        // through write_gpio below when the address falls in its window.
    }

    fn read_gpio(&self, addr: u32) -> u32 {
        let gpio = &self.gpio;
        if !gpio.read_enabled() {
            return 0;
        }
        match addr {
            0x080000c4 => u32::from(gpio.pin(0)) | (u32::from(gpio.pin(1)) << 1) | (u32::from(gpio.pin(2)) << 2),
            0x080000c6 => 0, // direction register is write-only in practice
            0x080000c8 => u32::from(gpio.read_enabled()),
            _ => 0,
        }
    }

    pub fn write_gpio(&mut self, addr: u32, value: u32, now_epoch_seconds: i64) {
        match addr {
            0x080000c4 => {
                let prev_clock = self.gpio.pin(0);
                self.gpio.set_pin(0, value & 1 != 0);
                self.gpio.set_pin(1, value & 2 != 0);
                self.gpio.set_pin(2, value & 4 != 0);
                let rising_clock = !prev_clock && self.gpio.pin(0);
                if rising_clock {
                    if let Some(rtc) = &mut self.rtc {
                        if self.gpio.pin(2) {
                            rtc.write_bit(self.gpio.pin(1), now_epoch_seconds);
                        }
                    }
                }
            }
            0x080000c6 => self.gpio.set_direction(value as u8),
            0x080000c8 => self.gpio.set_read_enable(value & 1 != 0),
            _ => {}
        }
    }

    pub fn read_save(&mut self, addr: u32, width: u32) -> u32 {
        self.save.read(addr, width)
    }

    pub fn write_save(&mut self, addr: u32, width: u32, value: u32) {
        self.save.write(addr, width, value);
    }

    pub fn export_save(&self) -> Option<(SaveKind, Vec<u8>)> {
        self.save.export()
    }

    pub fn export_rtc(&self, now_epoch_seconds: i64) -> Option<[u8; 24]> {
        self.rtc.as_ref().map(|r| r.export(now_epoch_seconds))
    }

    pub fn import_rtc(&mut self, bytes: &[u8; 24]) {
        if let Some(rtc) = &mut self.rtc {
            rtc.import(bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rom_little_endian() {
        let cart = Cartridge::new(vec![0x11, 0x22, 0x33, 0x44], None);
        assert_eq!(0x4433_2211, cart.read(0x0800_0000, 4));
    }

    #[test]
    fn eeprom_size_selects_address_width() {
        let wide_rom = vec![0u8; 0x100];
        let cart = Cartridge::with_eeprom(wide_rom);
        assert!(matches!(cart.save, SaveController::Eeprom(_)));
    }
}
