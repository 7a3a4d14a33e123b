// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! A square-wave PSG channel (SOUND1/SOUND2): duty cycle, a 6-bit length
//! counter, stepped envelope and, on SOUND1 only, a frequency sweep unit.

use gbacore_core::util::SharedCell;
use gbacore_core::{slot_cell, IoRegs, Slot, SlotStorage};

const DUTY_PATTERNS: [u8; 4] = [0b0000_0001, 0b0000_0011, 0b0000_1111, 0b0011_1111];

// CPU-cycle periods for the 256Hz length, 64Hz envelope and 128Hz sweep
// clocks derived from the 16.78MHz system clock.
const LENGTH_PERIOD: u32 = 65_536;
const ENVELOPE_PERIOD: u32 = 262_144;
const SWEEP_PERIOD: u32 = 131_072;

pub struct ToneChannel {
    sweep: Option<SharedCell<u32>>,
    duty_len_env: SharedCell<u32>,
    freq_control: SharedCell<u32>,
    restart: SharedCell<u32>,
    phase: u8,
    cycle_accum: u32,
    active: bool,
    length_counter: u32,
    length_accum: u32,
    envelope_volume: i16,
    envelope_accum: u32,
    sweep_shadow_freq: u32,
    sweep_accum: u32,
}

impl ToneChannel {
    /// `has_sweep` is true for SOUND1, which owns a sweep register at
    /// `base`; SOUND2 has no sweep register and its duty/length/envelope
    /// register sits at `base` directly instead of `base + 2`.
    pub fn new(io: &mut IoRegs, base: u32, has_sweep: bool) -> Self {
        let duty_len_env = slot_cell(0);
        let freq_control = slot_cell(0);
        let restart = slot_cell(0);

        let sweep = if has_sweep {
            let sweep = slot_cell(0);
            io.add_slot(base, Slot::new(SlotStorage::Cell(sweep.clone()), 0x7f, 0));
            io.add_slot(base + 2, Slot::new(SlotStorage::Cell(duty_len_env.clone()), 0xffff, 16));
            Some(sweep)
        } else {
            io.add_slot(base, Slot::new(SlotStorage::Cell(duty_len_env.clone()), 0xffff, 0));
            None
        };

        let restart_flag = restart.clone();
        io.add_slot(
            base + 4,
            Slot::new(SlotStorage::Cell(freq_control.clone()), 0xc7ff, 0).on_post_write(move |_old, new| {
                if new & (1 << 15) != 0 {
                    restart_flag.set(1);
                }
            }),
        );

        Self {
            sweep,
            duty_len_env,
            freq_control,
            restart,
            phase: 0,
            cycle_accum: 0,
            active: false,
            length_counter: 0,
            length_accum: 0,
            envelope_volume: 0,
            envelope_accum: 0,
            sweep_shadow_freq: 0,
            sweep_accum: 0,
        }
    }

    fn duty(&self) -> u8 {
        ((self.duty_len_env.get() >> 6) & 0x3) as u8
    }

    fn length_load(&self) -> u32 {
        self.duty_len_env.get() & 0x3f
    }

    fn envelope_initial(&self) -> i16 {
        ((self.duty_len_env.get() >> 12) & 0xf) as i16
    }

    fn envelope_increasing(&self) -> bool {
        self.duty_len_env.get() & (1 << 11) != 0
    }

    fn envelope_step(&self) -> u32 {
        (self.duty_len_env.get() >> 8) & 0x7
    }

    fn length_enabled(&self) -> bool {
        self.freq_control.get() & (1 << 14) != 0
    }

    fn rate(&self) -> u32 {
        self.freq_control.get() & 0x7ff
    }

    fn set_rate(&mut self, rate: u32) {
        let current = self.freq_control.get();
        self.freq_control.set((current & !0x7ff) | (rate & 0x7ff));
    }

    fn period_cycles(&self) -> u32 {
        (2048 - self.rate()).max(1) * 4
    }

    fn sweep_shift(&self) -> u32 {
        self.sweep.as_ref().map_or(0, |s| s.get() & 0x7)
    }

    fn sweep_decreasing(&self) -> bool {
        self.sweep.as_ref().map_or(false, |s| s.get() & (1 << 3) != 0)
    }

    fn sweep_time(&self) -> u32 {
        self.sweep.as_ref().map_or(0, |s| (s.get() >> 4) & 0x7)
    }

    fn restart_channel(&mut self) {
        self.active = true;
        self.phase = 0;
        self.cycle_accum = 0;
        self.length_counter = 64 - self.length_load();
        self.length_accum = 0;
        self.envelope_volume = self.envelope_initial();
        self.envelope_accum = 0;
        self.sweep_shadow_freq = self.rate();
        self.sweep_accum = 0;
        if self.sweep_shift() > 0 && self.sweep_overflowed(self.sweep_shadow_freq) {
            self.active = false;
        }
    }

    fn sweep_overflowed(&self, freq: u32) -> bool {
        !self.sweep_decreasing() && freq > 0x7ff
    }

    fn step_sweep(&mut self, elapsed: u32) {
        if self.sweep.is_none() || self.sweep_time() == 0 {
            return;
        }
        self.sweep_accum += elapsed;
        let period = SWEEP_PERIOD * self.sweep_time();
        while self.sweep_accum >= period {
            self.sweep_accum -= period;
            let shift = self.sweep_shift();
            if shift == 0 {
                continue;
            }
            let delta = self.sweep_shadow_freq >> shift;
            let new_freq = if self.sweep_decreasing() {
                self.sweep_shadow_freq.saturating_sub(delta)
            } else {
                self.sweep_shadow_freq + delta
            };
            if self.sweep_overflowed(new_freq) {
                self.active = false;
                return;
            }
            self.sweep_shadow_freq = new_freq;
            self.set_rate(new_freq);
        }
    }

    fn step_length(&mut self, elapsed: u32) {
        if !self.length_enabled() || self.length_counter == 0 {
            return;
        }
        self.length_accum += elapsed;
        while self.length_accum >= LENGTH_PERIOD {
            self.length_accum -= LENGTH_PERIOD;
            self.length_counter -= 1;
            if self.length_counter == 0 {
                self.active = false;
                break;
            }
        }
    }

    fn step_envelope(&mut self, elapsed: u32) {
        let step = self.envelope_step();
        if step == 0 {
            return;
        }
        self.envelope_accum += elapsed;
        let period = ENVELOPE_PERIOD * step;
        while self.envelope_accum >= period {
            self.envelope_accum -= period;
            if self.envelope_increasing() {
                self.envelope_volume = (self.envelope_volume + 1).min(15);
            } else {
                self.envelope_volume = (self.envelope_volume - 1).max(0);
            }
        }
    }

    pub fn step(&mut self, cycles: u32) {
        if self.restart.get() == 1 {
            self.restart.set(0);
            self.restart_channel();
        }
        if !self.active {
            return;
        }

        self.step_length(cycles);
        self.step_envelope(cycles);
        self.step_sweep(cycles);
        if !self.active {
            return;
        }

        self.cycle_accum += cycles;
        let period = self.period_cycles();
        while self.cycle_accum >= period {
            self.cycle_accum -= period;
            self.phase = (self.phase + 1) % 8;
        }
    }

    pub fn output(&self) -> i16 {
        if !self.active {
            return 0;
        }
        let pattern = DUTY_PATTERNS[self.duty() as usize];
        let high = (pattern >> self.phase) & 1 != 0;
        if high {
            self.envelope_volume
        } else {
            -self.envelope_volume
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_before_first_restart() {
        let mut io = IoRegs::new();
        let tone = ToneChannel::new(&mut io, 0x60, true);
        assert_eq!(0, tone.output());
    }

    #[test]
    fn restart_arms_envelope_and_tracks_duty_pattern() {
        let mut io = IoRegs::new();
        let mut tone = ToneChannel::new(&mut io, 0x60, true);
        io.write(0x62, 2, (0xf << 12) | (0 << 6));
        io.write(0x64, 2, (1 << 15) | 1024);
        tone.step(0);
        assert_eq!(15, tone.output());
        tone.step(4096);
        assert_eq!(-15, tone.output());
    }

    #[test]
    fn length_counter_silences_channel_when_enabled() {
        let mut io = IoRegs::new();
        let mut tone = ToneChannel::new(&mut io, 0x60, true);
        io.write(0x62, 2, (0xf << 12) | 63); // length load = 63 -> counts down from 1
        io.write(0x64, 2, (1 << 15) | (1 << 14) | 1024);
        tone.step(0);
        assert_eq!(15, tone.output());
        tone.step(LENGTH_PERIOD);
        assert_eq!(0, tone.output());
    }

    #[test]
    fn envelope_decays_toward_zero() {
        let mut io = IoRegs::new();
        let mut tone = ToneChannel::new(&mut io, 0x60, true);
        io.write(0x62, 2, (4 << 12) | (1 << 8)); // initial volume 4, step 1, decreasing
        io.write(0x64, 2, 1 << 15);
        tone.step(0);
        assert_eq!(4, tone.output());
        tone.step(ENVELOPE_PERIOD);
        assert_eq!(3, tone.output());
    }

    #[test]
    fn sweep_overflow_disables_channel() {
        let mut io = IoRegs::new();
        let mut tone = ToneChannel::new(&mut io, 0x60, true);
        io.write(0x60, 1, (1 << 4) | 1); // sweep time 1, shift 1, increasing
        io.write(0x62, 2, 0xf << 12);
        io.write(0x64, 2, (1 << 15) | 0x7ff); // near-max rate, will overflow on increase
        tone.step(0);
        assert_eq!(15, tone.output());
        tone.step(SWEEP_PERIOD);
        assert_eq!(0, tone.output());
    }

    #[test]
    fn tone2_has_no_sweep_register_and_duty_sits_at_base() {
        let mut io = IoRegs::new();
        let mut tone = ToneChannel::new(&mut io, 0x68, false);
        io.write(0x68, 2, 0xf << 12);
        io.write(0x6c, 2, 1 << 15);
        tone.step(0);
        assert_eq!(15, tone.output());
    }
}
