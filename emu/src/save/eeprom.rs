// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! Serial EEPROM: 8 KiB, addressed with a 6-bit (narrow, ROM > 16 MiB) or
//! 14-bit (wide, ROM <= 16 MiB) bitstream protocol.

const EEPROM_SIZE: usize = 0x2000;
const CELL_BITS: usize = 64;

#[derive(Copy, Clone, PartialEq, Eq)]
enum Phase {
    Command,
    Address,
    WriteData,
    WriteStop,
    ReadDummy,
    ReadData,
    Idle,
}

pub struct Eeprom {
    data: Vec<u8>,
    address_bits: usize,
    phase: Phase,
    shift_in: u64,
    bits_received: usize,
    command: u8,
    address: usize,
    out_bit_index: usize,
}

impl Eeprom {
    pub fn new(wide: bool) -> Self {
        Self {
            data: vec![0xff; EEPROM_SIZE],
            address_bits: if wide { 14 } else { 6 },
            phase: Phase::Command,
            shift_in: 0,
            bits_received: 0,
            command: 0,
            address: 0,
            out_bit_index: 0,
        }
    }

    fn cell_offset(address: usize) -> usize {
        (address * CELL_BITS) / 8
    }

    pub fn write_bit(&mut self, bit: bool) {
        match self.phase {
            Phase::Command => {
                self.command = (self.command << 1) | u8::from(bit);
                self.bits_received += 1;
                if self.bits_received == 2 {
                    self.bits_received = 0;
                    self.address = 0;
                    self.phase = Phase::Address;
                }
            }
            Phase::Address => {
                self.address = (self.address << 1) | usize::from(bit);
                self.bits_received += 1;
                if self.bits_received == self.address_bits {
                    self.bits_received = 0;
                    self.shift_in = 0;
                    if self.command == 0b10 {
                        self.out_bit_index = 0;
                        self.phase = Phase::ReadDummy;
                    } else {
                        self.phase = Phase::WriteData;
                    }
                }
            }
            Phase::WriteData => {
                self.shift_in = (self.shift_in << 1) | u64::from(bit);
                self.bits_received += 1;
                if self.bits_received == CELL_BITS {
                    self.commit_write();
                    self.phase = Phase::WriteStop;
                }
            }
            Phase::WriteStop => {
                self.phase = Phase::Idle;
            }
            Phase::ReadDummy | Phase::ReadData | Phase::Idle => {
                self.phase = Phase::Command;
                self.bits_received = 0;
                self.command = 0;
                self.write_bit(bit);
            }
        }
    }

    fn commit_write(&mut self) {
        let offset = Self::cell_offset(self.address);
        let bytes = self.shift_in.to_be_bytes();
        self.data[offset..offset + 8].copy_from_slice(&bytes);
    }

    /// Clocks out the next bit: four leading zero bits, then the 64-bit cell
    /// content, matching the host-visible read protocol.
    pub fn read(&mut self) -> u8 {
        match self.phase {
            Phase::ReadDummy => {
                self.out_bit_index += 1;
                if self.out_bit_index == 4 {
                    self.out_bit_index = 0;
                    self.phase = Phase::ReadData;
                }
                0
            }
            Phase::ReadData => {
                let offset = Self::cell_offset(self.address);
                let mut cell = [0u8; 8];
                cell.copy_from_slice(&self.data[offset..offset + 8]);
                let value = u64::from_be_bytes(cell);
                let bit = (value >> (63 - self.out_bit_index)) & 1;
                self.out_bit_index += 1;
                if self.out_bit_index == CELL_BITS {
                    self.phase = Phase::Idle;
                }
                bit as u8
            }
            _ => 1,
        }
    }

    pub fn export(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn import(&mut self, bytes: &[u8]) {
        let n = bytes.len().min(self.data.len());
        self.data[..n].copy_from_slice(&bytes[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_bits(e: &mut Eeprom, bits: &[bool]) {
        for &b in bits {
            e.write_bit(b);
        }
    }

    #[test]
    fn write_then_read_round_trip() {
        let mut e = Eeprom::new(false);
        let mut bits = vec![true, true]; // write command 11
        bits.extend(std::iter::repeat(false).take(6)); // address 0
        let pattern: Vec<bool> = (0..64).map(|i| i % 2 == 0).collect();
        bits.extend(pattern.iter().copied());
        bits.push(true); // stop bit
        write_bits(&mut e, &bits);

        let mut read_bits = vec![true, false]; // read command 10
        read_bits.extend(std::iter::repeat(false).take(6));
        write_bits(&mut e, &read_bits);

        let mut out = Vec::new();
        for _ in 0..68 {
            out.push(e.read());
        }
        assert_eq!([0, 0, 0, 0], out[0..4]);
        for (i, expected) in pattern.iter().enumerate() {
            assert_eq!(u8::from(*expected), out[4 + i], "bit {}", i);
        }
    }
}
