// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! Construction-time configuration: the ambient knobs a host picks before
//! building a [`crate::system::System`], validated up front rather than
//! discovered mid-emulation.

use gbacore_emu::bus::BIOS_SIZE;

use crate::error::ConfigError;

const MAX_ROM_SIZE: usize = 32 * 1024 * 1024;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SaveHint {
    Auto,
    Sram,
    Flash512K,
    Flash1M,
    Eeprom,
    None,
}

/// How a [`crate::system::System`] should be built: the BIOS and ROM images
/// plus everything that varies per title rather than per instruction.
pub struct Config {
    pub bios: Vec<u8>,
    pub rom: Vec<u8>,
    pub save_hint: SaveHint,
    pub rtc_enabled: bool,
    pub day_of_week_offset: u8,
    pub skip_bios: bool,
}

impl Config {
    pub fn new(bios: Vec<u8>, rom: Vec<u8>) -> Result<Self, ConfigError> {
        if bios.len() != BIOS_SIZE {
            return Err(ConfigError::BadBiosSize {
                expected: BIOS_SIZE,
                actual: bios.len(),
            });
        }
        if rom.len() > MAX_ROM_SIZE {
            return Err(ConfigError::RomTooLarge {
                actual: rom.len(),
                limit: MAX_ROM_SIZE,
            });
        }
        Ok(Self {
            bios,
            rom,
            save_hint: SaveHint::Auto,
            rtc_enabled: false,
            day_of_week_offset: 0,
            skip_bios: false,
        })
    }

    pub fn with_save_hint(mut self, hint: SaveHint) -> Self {
        self.save_hint = hint;
        self
    }

    pub fn with_rtc(mut self, enabled: bool, day_of_week_offset: u8) -> Self {
        self.rtc_enabled = enabled;
        self.day_of_week_offset = day_of_week_offset;
        self
    }

    pub fn with_skip_bios(mut self, skip: bool) -> Self {
        self.skip_bios = skip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_bios_size() {
        let err = Config::new(vec![0u8; 10], vec![0u8; 0x100]).unwrap_err();
        assert!(matches!(err, ConfigError::BadBiosSize { .. }));
    }

    #[test]
    fn rejects_oversized_rom() {
        let err = Config::new(vec![0u8; BIOS_SIZE], vec![0u8; MAX_ROM_SIZE + 1]).unwrap_err();
        assert!(matches!(err, ConfigError::RomTooLarge { .. }));
    }

    #[test]
    fn accepts_valid_images() {
        let config = Config::new(vec![0u8; BIOS_SIZE], vec![0u8; 0x100]).unwrap();
        assert_eq!(SaveHint::Auto, config.save_hint);
    }
}
