// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! A direct-sound FIFO: a 32-byte ring buffer of signed 8-bit samples fed by
//! DMA and drained one entry per timer overflow. Dropping to half capacity
//! raises a one-shot refill signal the scheduler uses to re-arm the
//! corresponding DMA channel.

const CAPACITY: usize = 32;
const REFILL_THRESHOLD: usize = 16;

pub struct DirectSoundFifo {
    queue: Vec<i8>,
    current: i8,
    needs_refill: bool,
}

impl DirectSoundFifo {
    pub fn new() -> Self {
        Self {
            queue: Vec::with_capacity(CAPACITY),
            current: 0,
            needs_refill: false,
        }
    }

    pub fn push(&mut self, byte: i8) {
        if self.queue.len() < CAPACITY {
            self.queue.push(byte);
        }
    }

    pub fn tick(&mut self) {
        if !self.queue.is_empty() {
            self.current = self.queue.remove(0);
        }
        if self.queue.len() <= REFILL_THRESHOLD {
            self.needs_refill = true;
        }
    }

    /// Consumes the one-shot "occupancy dropped to half capacity or below"
    /// signal exactly once per occurrence.
    pub fn take_needs_refill(&mut self) -> bool {
        std::mem::take(&mut self.needs_refill)
    }

    pub fn output(&self) -> i8 {
        self.current
    }
}

impl Default for DirectSoundFifo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_drains_in_order() {
        let mut fifo = DirectSoundFifo::new();
        fifo.push(1);
        fifo.push(2);
        fifo.tick();
        assert_eq!(1, fifo.output());
        fifo.tick();
        assert_eq!(2, fifo.output());
    }

    #[test]
    fn needs_refill_once_at_or_below_half_capacity() {
        let mut fifo = DirectSoundFifo::new();
        for i in 0..20 {
            fifo.push(i);
        }
        fifo.tick();
        assert!(!fifo.take_needs_refill());
        for _ in 0..4 {
            fifo.tick();
        }
        assert!(fifo.take_needs_refill());
        assert!(!fifo.take_needs_refill());
    }
}
