// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! Plain battery-backed SRAM: 32 KiB, byte-addressable.

pub const SRAM_SIZE: usize = 0x8000;

pub struct Sram {
    data: Vec<u8>,
}

impl Sram {
    pub fn new() -> Self {
        Self {
            data: vec![0xff; SRAM_SIZE],
        }
    }

    pub fn read(&self, addr: u32) -> u8 {
        self.data[(addr as usize) % SRAM_SIZE]
    }

    pub fn write(&mut self, addr: u32, value: u8) {
        let len = self.data.len();
        self.data[(addr as usize) % len] = value;
    }

    pub fn export(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn import(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(self.data.len());
        self.data[..n].copy_from_slice(&bytes[..n]);
    }
}

impl Default for Sram {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_round_trip() {
        let mut sram = Sram::new();
        sram.write(0x10, 0x42);
        assert_eq!(0x42, sram.read(0x10));
    }

    #[test]
    fn export_import_round_trip() {
        let mut sram = Sram::new();
        sram.write(0, 0x11);
        let blob = sram.export();
        let mut other = Sram::new();
        other.import(&blob);
        assert_eq!(0x11, other.read(0));
    }
}
