// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! The 4 cascadable timers: free-running 16-bit counters with a prescaled
//! tick rate, optional cascade-from-previous-timer, and overflow IRQs.

use gbacore_core::util::SharedCell;
use gbacore_core::{slot_cell, IoRegs, Slot, SlotStorage};

use crate::irq::{Irq, IrqSource};

const PRESCALER_SHIFTS: [u32; 4] = [0, 6, 8, 10];
const BASE_ADDR: u32 = 0x0100;
const STRIDE: u32 = 4;

struct Timer {
    reload: SharedCell<u32>,
    control: SharedCell<u32>,
    counter: u16,
    sub_ticks: u32,
    irq_source: IrqSource,
}

impl Timer {
    fn enabled(&self) -> bool {
        self.control.get() & (1 << 7) != 0
    }

    fn cascade(&self) -> bool {
        self.control.get() & (1 << 2) != 0
    }

    fn irq_on_overflow(&self) -> bool {
        self.control.get() & (1 << 6) != 0
    }
}

/// The timer block. `step(cycles)` advances every enabled, non-cascading
/// timer by the elapsed cycle count; cascading timers tick once per
/// overflow of the timer below them, handled as part of the same call.
pub struct Timers {
    timers: Vec<Timer>,
    fifo_a_ticks: u32,
    fifo_b_ticks: u32,
}

impl Timers {
    pub fn new(io: &mut IoRegs) -> Self {
        let timers = (0..4)
            .map(|i| {
                let base = BASE_ADDR + i as u32 * STRIDE;
                let reload = slot_cell(0);
                let control = slot_cell(0);
                io.add_slot(base, Slot::new(SlotStorage::Cell(reload.clone()), 0xffff, 0));
                io.add_slot(base + 2, Slot::new(SlotStorage::Cell(control.clone()), 0xff, 16));
                Timer {
                    reload,
                    control,
                    counter: 0,
                    sub_ticks: 0,
                    irq_source: match i {
                        0 => IrqSource::Timer0Overflow,
                        1 => IrqSource::Timer1Overflow,
                        2 => IrqSource::Timer2Overflow,
                        _ => IrqSource::Timer3Overflow,
                    },
                }
            })
            .collect();
        Self {
            timers,
            fifo_a_ticks: 0,
            fifo_b_ticks: 0,
        }
    }

    pub fn step(&mut self, cycles: u32, irq: &Irq) {
        let mut cascaded_overflow = false;
        for index in 0..self.timers.len() {
            let enabled = self.timers[index].enabled();
            if !enabled {
                cascaded_overflow = false;
                continue;
            }
            let overflowed = if self.timers[index].cascade() && index > 0 {
                let did = cascaded_overflow;
                if did {
                    self.tick_once(index, irq);
                }
                did
            } else {
                let shift = PRESCALER_SHIFTS[self.timers[index].control.get() as usize & 0x3];
                self.timers[index].sub_ticks += cycles;
                let mut did_overflow = false;
                while self.timers[index].sub_ticks >= (1 << shift) {
                    self.timers[index].sub_ticks -= 1 << shift;
                    if self.tick_once(index, irq) {
                        did_overflow = true;
                    }
                }
                did_overflow
            };
            cascaded_overflow = overflowed;
        }
    }

    /// Advances one timer by a single count, returning whether it
    /// overflowed. Overflow reloads the counter and optionally posts an IRQ.
    fn tick_once(&mut self, index: usize, irq: &Irq) -> bool {
        let (next, overflowed) = self.timers[index].counter.overflowing_add(1);
        if overflowed {
            self.timers[index].counter = self.timers[index].reload.get() as u16;
            if self.timers[index].irq_on_overflow() {
                irq.request(self.timers[index].irq_source);
            }
            if index == 0 {
                self.fifo_a_ticks += 1;
                self.fifo_b_ticks += 1;
            }
        } else {
            self.timers[index].counter = next;
        }
        overflowed
    }

    pub fn counter(&self, index: usize) -> u16 {
        self.timers[index].counter
    }

    pub fn take_fifo_a_ticks(&mut self) -> u32 {
        std::mem::take(&mut self.fifo_a_ticks)
    }

    pub fn take_fifo_b_ticks(&mut self) -> u32 {
        std::mem::take(&mut self.fifo_b_ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_reloads_and_requests_irq() {
        let mut io = IoRegs::new();
        let mut timers = Timers::new(&mut io);
        let irq = Irq::new(&mut io);

        io.write(BASE_ADDR, 2, 0xfffe);
        io.write(BASE_ADDR + 2, 2, (1 << 7) | (1 << 6));

        timers.step(1, &irq);
        assert_eq!(0xffff, timers.counter(0));
        timers.step(1, &irq);
        assert_eq!(0xfffe, timers.counter(0));
        let timer0_overflow_bit = 1 << 3;
        assert_eq!(timer0_overflow_bit, io.read(0x0202, 2) & timer0_overflow_bit);
    }

    #[test]
    fn cascading_timer_ticks_on_prior_overflow() {
        let mut io = IoRegs::new();
        let mut timers = Timers::new(&mut io);
        let irq = Irq::new(&mut io);

        io.write(BASE_ADDR, 2, 0xffff);
        io.write(BASE_ADDR + 2, 2, 1 << 7);
        io.write(BASE_ADDR + 4, 2, 0);
        io.write(BASE_ADDR + 6, 2, (1 << 7) | (1 << 2));

        timers.step(1, &irq);
        assert_eq!(1, timers.counter(1));
    }
}
