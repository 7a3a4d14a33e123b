// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! Cartridge save memory controllers: SRAM, Flash, serial EEPROM and RTC.

mod eeprom;
mod flash;
mod gpio;
mod rtc;
mod sram;

pub use eeprom::Eeprom;
pub use flash::{Flash, FlashKind};
pub use gpio::Gpio;
pub use rtc::Rtc;
pub use sram::Sram;

/// Which kind of backing store a save blob describes, matching the
/// container's block-kind byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SaveKind {
    Eeprom,
    Sram,
    Flash512K,
    Flash1M,
    Rtc,
}

/// The save controller wired into the cartridge's memory window at
/// 0x0E000000-0x0E00FFFF (SRAM/Flash) or the EEPROM window (0x0D000000 or
/// 0x0DFFFF00 depending on ROM size).
pub enum SaveController {
    None,
    Sram(Sram),
    Flash(Flash),
    Eeprom(Eeprom),
}

impl SaveController {
    pub fn read(&mut self, addr: u32, width: u32) -> u32 {
        match self {
            SaveController::None => 0xff,
            SaveController::Sram(s) => u32::from(s.read(addr)),
            SaveController::Flash(f) => u32::from(f.read(addr)),
            SaveController::Eeprom(e) => u32::from(e.read()),
        }
        .min(if width >= 2 { 0xffff } else { 0xff })
    }

    pub fn write(&mut self, addr: u32, width: u32, value: u32) {
        match self {
            SaveController::None => {}
            SaveController::Sram(s) => s.write(addr, value as u8),
            SaveController::Flash(f) => f.write(addr, value as u8),
            SaveController::Eeprom(e) => {
                if width >= 2 {
                    e.write_bit(value & 1 != 0);
                }
            }
        }
    }

    pub fn export(&self) -> Option<(SaveKind, Vec<u8>)> {
        match self {
            SaveController::None => None,
            SaveController::Sram(s) => Some((SaveKind::Sram, s.export())),
            SaveController::Flash(f) => Some((
                if f.kind() == FlashKind::Panasonic512K {
                    SaveKind::Flash512K
                } else {
                    SaveKind::Flash1M
                },
                f.export(),
            )),
            SaveController::Eeprom(e) => Some((SaveKind::Eeprom, e.export())),
        }
    }

    pub fn import(&mut self, bytes: &[u8]) {
        match self {
            SaveController::None => {}
            SaveController::Sram(s) => s.import(bytes),
            SaveController::Flash(f) => f.import(bytes),
            SaveController::Eeprom(e) => e.import(bytes),
        }
    }
}
