// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! The sound mixer: 4 PSG channels plus 2 direct-sound FIFOs, mixed to a
//! stereo sample batch every 256 cycles (component K).

mod fifo;
mod noise;
mod tone;
mod wave;

pub use fifo::DirectSoundFifo;
pub use noise::NoiseChannel;
pub use tone::ToneChannel;
pub use wave::WaveChannel;

use gbacore_core::util::SharedCell;
use gbacore_core::{slot_cell, IoRegs, Slot, SlotStorage};

pub const CYCLES_PER_SAMPLE: u32 = 256;

const SOUNDCNT_L_ADDR: u32 = 0x0080;
const SOUNDCNT_H_ADDR: u32 = 0x0082;
const SOUNDCNT_X_ADDR: u32 = 0x0084;

/// One stereo 16-bit PCM sample.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Sample {
    pub left: i16,
    pub right: i16,
}

pub struct Sound {
    tone1: ToneChannel,
    tone2: ToneChannel,
    wave: WaveChannel,
    noise: NoiseChannel,
    fifo_a: DirectSoundFifo,
    fifo_b: DirectSoundFifo,
    soundcnt_l: SharedCell<u32>,
    soundcnt_h: SharedCell<u32>,
    soundcnt_x: SharedCell<u32>,
    cycle_accum: u32,
    batch: Vec<Sample>,
}

impl Sound {
    pub fn new(io: &mut IoRegs) -> Self {
        let soundcnt_l = slot_cell(0);
        let soundcnt_h = slot_cell(0);
        let soundcnt_x = slot_cell(0);
        io.add_slot(SOUNDCNT_L_ADDR, Slot::new(SlotStorage::Cell(soundcnt_l.clone()), 0xff77, 0));
        io.add_slot(SOUNDCNT_H_ADDR, Slot::new(SlotStorage::Cell(soundcnt_h.clone()), 0xff0f, 16));
        io.add_slot(
            SOUNDCNT_X_ADDR,
            Slot::new(SlotStorage::Cell(soundcnt_x.clone()), 0x80, 0),
        );

        Self {
            tone1: ToneChannel::new(io, 0x0060, true),
            tone2: ToneChannel::new(io, 0x0068, false),
            wave: WaveChannel::new(io, 0x0070),
            noise: NoiseChannel::new(io, 0x0078),
            fifo_a: DirectSoundFifo::new(),
            fifo_b: DirectSoundFifo::new(),
            soundcnt_l,
            soundcnt_h,
            soundcnt_x,
            cycle_accum: 0,
            batch: Vec::new(),
        }
    }

    fn master_enabled(&self) -> bool {
        self.soundcnt_x.get() & 0x80 != 0
    }

    pub fn push_fifo_a(&mut self, byte: i8) {
        self.fifo_a.push(byte);
    }

    pub fn push_fifo_b(&mut self, byte: i8) {
        self.fifo_b.push(byte);
    }

    /// Called once per elapsed timer-0/1 overflow wired to a FIFO's DMA
    /// request, per the direct-sound spec; pops one byte and latches it as
    /// the channel's current output level.
    pub fn tick_fifo_a(&mut self) {
        self.fifo_a.tick();
    }

    pub fn tick_fifo_b(&mut self) {
        self.fifo_b.tick();
    }

    /// Consumed by the scheduler to re-arm the SOUND_QUEUE_A/B DMA timing
    /// once per occupancy drop to half capacity.
    pub fn take_fifo_a_needs_refill(&mut self) -> bool {
        self.fifo_a.take_needs_refill()
    }

    pub fn take_fifo_b_needs_refill(&mut self) -> bool {
        self.fifo_b.take_needs_refill()
    }

    /// Advances the PSG channels and mixes a new sample every
    /// [`CYCLES_PER_SAMPLE`] cycles, appending it to the pending batch.
    pub fn step(&mut self, cycles: u32) {
        if !self.master_enabled() {
            return;
        }
        self.tone1.step(cycles);
        self.tone2.step(cycles);
        self.wave.step(cycles);
        self.noise.step(cycles);

        self.cycle_accum += cycles;
        while self.cycle_accum >= CYCLES_PER_SAMPLE {
            self.cycle_accum -= CYCLES_PER_SAMPLE;
            self.batch.push(self.mix());
        }
    }

    fn mix(&self) -> Sample {
        let psg = i32::from(self.tone1.output())
            + i32::from(self.tone2.output())
            + i32::from(self.wave.output())
            + i32::from(self.noise.output());
        let direct = i32::from(self.fifo_a.output()) * 4 + i32::from(self.fifo_b.output()) * 4;
        let total = (psg * 64 + direct).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        Sample {
            left: total,
            right: total,
        }
    }

    /// Drains every sample mixed since the last call.
    pub fn take_batch(&mut self) -> Vec<Sample> {
        std::mem::take(&mut self.batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_master_produces_no_samples() {
        let mut io = IoRegs::new();
        let mut sound = Sound::new(&mut io);
        sound.step(CYCLES_PER_SAMPLE * 4);
        assert!(sound.take_batch().is_empty());
    }

    #[test]
    fn enabled_master_mixes_a_sample_per_interval() {
        let mut io = IoRegs::new();
        let mut sound = Sound::new(&mut io);
        io.write(SOUNDCNT_X_ADDR, 2, 0x80);
        sound.step(CYCLES_PER_SAMPLE * 3);
        assert_eq!(3, sound.take_batch().len());
    }

    #[test]
    fn fifo_push_and_tick_updates_output() {
        let mut io = IoRegs::new();
        let mut sound = Sound::new(&mut io);
        sound.push_fifo_a(42);
        sound.tick_fifo_a();
        assert_eq!(42, sound.fifo_a.output());
    }
}
