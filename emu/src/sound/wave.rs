// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! SOUND3: a 32-sample 4-bit wave pattern played back at a programmable
//! rate.

use gbacore_core::util::SharedCell;
use gbacore_core::{slot_cell, IoRegs, Slot, SlotStorage};

const WAVE_RAM_ADDR: u32 = 0x0090;
const WAVE_SAMPLES: usize = 32;

pub struct WaveChannel {
    control: SharedCell<u32>,
    length_volume: SharedCell<u32>,
    freq_control: SharedCell<u32>,
    ram: Vec<SharedCell<u32>>,
    phase: usize,
    cycle_accum: u32,
}

impl WaveChannel {
    pub fn new(io: &mut IoRegs, base: u32) -> Self {
        let control = slot_cell(0);
        let length_volume = slot_cell(0);
        let freq_control = slot_cell(0);
        io.add_slot(base, Slot::new(SlotStorage::Cell(control.clone()), 0xff, 0));
        io.add_slot(base + 2, Slot::new(SlotStorage::Cell(length_volume.clone()), 0xffff, 16));
        io.add_slot(base + 4, Slot::new(SlotStorage::Cell(freq_control.clone()), 0xffff, 0));

        let ram = (0..8)
            .map(|i| {
                let cell = slot_cell(0);
                io.add_slot(WAVE_RAM_ADDR + i * 4, Slot::new(SlotStorage::Cell(cell.clone()), 0xffff_ffff, 0));
                cell
            })
            .collect();

        Self {
            control,
            length_volume,
            freq_control,
            ram,
            phase: 0,
            cycle_accum: 0,
        }
    }

    fn playing(&self) -> bool {
        self.control.get() & (1 << 7) != 0 && self.freq_control.get() & (1 << 15) != 0
    }

    fn volume_shift(&self) -> u32 {
        match (self.length_volume.get() >> 13) & 0x3 {
            0 => 4,
            1 => 0,
            2 => 1,
            _ => 2,
        }
    }

    fn period_cycles(&self) -> u32 {
        let rate = self.freq_control.get() & 0x7ff;
        (2048 - rate).max(1) * 2
    }

    fn sample_at(&self, index: usize) -> u8 {
        let word = self.ram[index / 8].get();
        let nibble_index = index % 8;
        ((word >> (nibble_index * 4)) & 0xf) as u8
    }

    pub fn step(&mut self, cycles: u32) {
        if !self.playing() {
            return;
        }
        self.cycle_accum += cycles;
        let period = self.period_cycles();
        while self.cycle_accum >= period {
            self.cycle_accum -= period;
            self.phase = (self.phase + 1) % WAVE_SAMPLES;
        }
    }

    pub fn output(&self) -> i16 {
        if !self.playing() {
            return 0;
        }
        let raw = i16::from(self.sample_at(self.phase)) - 8;
        raw >> self.volume_shift()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_when_dac_off() {
        let mut io = IoRegs::new();
        let wave = WaveChannel::new(&mut io, 0x70);
        assert_eq!(0, wave.output());
    }

    #[test]
    fn plays_back_pattern_at_full_volume() {
        let mut io = IoRegs::new();
        let mut wave = WaveChannel::new(&mut io, 0x70);
        io.write(0x70, 1, 1 << 7);
        io.write(0x72, 2, 1 << 13);
        io.write(WAVE_RAM_ADDR, 4, 0xf);
        io.write(0x74, 2, (1 << 15) | 1024);
        assert_eq!(7, wave.output());
    }
}
