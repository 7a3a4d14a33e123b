// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! The 4-channel DMA engine: priority-ordered, timing-gated block transfers
//! between any two bus addresses.

use gbacore_core::util::SharedCell;
use gbacore_core::{slot_cell, IoRegs, Slot, SlotStorage};

use crate::cpu::CpuBus;
use crate::irq::{Irq, IrqSource};

/// The direct-sound FIFOs share the I/O page with every other register;
/// only a DMA whose destination lands on one of these two addresses can
/// ever decode to `SoundQueueA`/`SoundQueueB`.
const FIFO_A_ADDR: u32 = 0x0400_00a0;
const FIFO_B_ADDR: u32 = 0x0400_00a4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DmaTiming {
    /// The "Special" control bits on a channel that cannot decode to
    /// anything meaningful (channel 0 has no FIFO or capture role).
    Disabled,
    Immediate,
    VBlank,
    HBlank,
    SoundQueueA,
    SoundQueueB,
    VideoCapture,
}

impl DmaTiming {
    /// Decodes a channel's timing from its control bits, its index (0-3)
    /// and its currently configured destination address: the "Special"
    /// encoding means something different per channel, and for channels 1
    /// and 2 specifically depends on which sound FIFO register the
    /// destination points at.
    fn decode(bits: u32, channel_index: usize, dst_addr: u32) -> Self {
        match bits & 0x3 {
            0 => DmaTiming::Immediate,
            1 => DmaTiming::VBlank,
            2 => DmaTiming::HBlank,
            _ => match channel_index {
                3 => DmaTiming::VideoCapture,
                1 | 2 if dst_addr == FIFO_A_ADDR => DmaTiming::SoundQueueA,
                1 | 2 if dst_addr == FIFO_B_ADDR => DmaTiming::SoundQueueB,
                _ => DmaTiming::Disabled,
            },
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum AddressControl {
    Increment,
    Decrement,
    Fixed,
    IncrementReload,
}

impl AddressControl {
    fn decode(bits: u32) -> Self {
        match bits & 0x3 {
            0 => AddressControl::Increment,
            1 => AddressControl::Decrement,
            2 => AddressControl::Fixed,
            _ => AddressControl::IncrementReload,
        }
    }

    fn step(self, word_size: u32) -> i64 {
        match self {
            AddressControl::Increment | AddressControl::IncrementReload => i64::from(word_size),
            AddressControl::Decrement => -i64::from(word_size),
            AddressControl::Fixed => 0,
        }
    }
}

struct Channel {
    index: usize,
    src_lo: SharedCell<u32>,
    src_hi: SharedCell<u32>,
    dst_lo: SharedCell<u32>,
    dst_hi: SharedCell<u32>,
    count: SharedCell<u32>,
    control: SharedCell<u32>,
    src_addr: u32,
    dst_addr: u32,
    words_remaining: u32,
    active: bool,
    irq_source: IrqSource,
}

impl Channel {
    fn control_bits(&self) -> u32 {
        self.control.get()
    }

    fn enabled(&self) -> bool {
        self.control_bits() & (1 << 15) != 0
    }

    fn repeat(&self) -> bool {
        self.control_bits() & (1 << 9) != 0
    }

    fn word_size(&self) -> u32 {
        if self.control_bits() & (1 << 10) != 0 {
            4
        } else {
            2
        }
    }

    fn timing(&self) -> DmaTiming {
        let dst_addr = self.dst_lo.get() | (self.dst_hi.get() << 16);
        DmaTiming::decode(self.control_bits() >> 12, self.index, dst_addr)
    }

    fn dst_control(&self) -> AddressControl {
        AddressControl::decode(self.control_bits() >> 5)
    }

    fn src_control(&self) -> AddressControl {
        AddressControl::decode(self.control_bits() >> 7)
    }

    fn irq_on_complete(&self) -> bool {
        self.control_bits() & (1 << 14) != 0
    }

    fn reload(&mut self, address_mask: u32, count_mask: u32) {
        self.src_addr = (self.src_lo.get() | (self.src_hi.get() << 16)) & address_mask;
        self.dst_addr = (self.dst_lo.get() | (self.dst_hi.get() << 16)) & address_mask;
        let count = self.count.get() & count_mask;
        self.words_remaining = if count == 0 { count_mask + 1 } else { count };
    }
}

/// The 4 DMA channels, checked in priority order (0 highest) once per
/// scheduler tick against the requested timing.
pub struct Dma {
    channels: Vec<Channel>,
}

const BASE_ADDR: u32 = 0x00b0;
const CHANNEL_STRIDE: u32 = 0x0c;
const ADDRESS_MASKS: [u32; 4] = [0x07ff_ffff, 0x0fff_ffff, 0x0fff_ffff, 0x0fff_ffff];
const COUNT_MASKS: [u32; 4] = [0x3fff, 0x3fff, 0x3fff, 0xffff];

impl Dma {
    pub fn new(io: &mut IoRegs) -> Self {
        let channels = (0..4)
            .map(|i| {
                let base = BASE_ADDR + i as u32 * CHANNEL_STRIDE;
                let src_lo = slot_cell(0);
                let src_hi = slot_cell(0);
                let dst_lo = slot_cell(0);
                let dst_hi = slot_cell(0);
                let count = slot_cell(0);
                let control = slot_cell(0);

                io.add_slot(base, Slot::new(SlotStorage::Cell(src_lo.clone()), 0xffff, 0));
                io.add_slot(base + 2, Slot::new(SlotStorage::Cell(src_hi.clone()), ADDRESS_MASKS[i] >> 16, 16));
                io.add_slot(base + 4, Slot::new(SlotStorage::Cell(dst_lo.clone()), 0xffff, 0));
                io.add_slot(base + 6, Slot::new(SlotStorage::Cell(dst_hi.clone()), ADDRESS_MASKS[i] >> 16, 16));
                io.add_slot(base + 8, Slot::new(SlotStorage::Cell(count.clone()), COUNT_MASKS[i], 0));
                io.add_slot(base + 10, Slot::new(SlotStorage::Cell(control.clone()), 0xffff, 16));

                Channel {
                    index: i,
                    src_lo,
                    src_hi,
                    dst_lo,
                    dst_hi,
                    count,
                    control,
                    src_addr: 0,
                    dst_addr: 0,
                    words_remaining: 0,
                    active: false,
                    irq_source: match i {
                        0 => IrqSource::Dma0,
                        1 => IrqSource::Dma1,
                        2 => IrqSource::Dma2,
                        _ => IrqSource::Dma3,
                    },
                }
            })
            .collect();
        Self { channels }
    }

    /// Runs any channel newly armed for `timing` (or already mid-transfer)
    /// to completion. GBA DMA is not truly cycle-interleaved with the CPU in
    /// this core; a triggered transfer completes in one call.
    pub fn run(&mut self, bus: &mut dyn CpuBus, irq: &Irq, timing: DmaTiming) {
        for i in 0..self.channels.len() {
            let armed = self.channels[i].enabled() && self.channels[i].timing() == timing;
            if !self.channels[i].active && armed {
                self.channels[i].reload(ADDRESS_MASKS[i], COUNT_MASKS[i]);
                self.channels[i].active = true;
            }
            if self.channels[i].active {
                self.transfer_channel(i, bus);
                if !self.channels[i].repeat() || self.channels[i].timing() == DmaTiming::Immediate {
                    let control = self.channels[i].control.get();
                    self.channels[i].control.set(control & !(1 << 15));
                }
                self.channels[i].active = false;
                if self.channels[i].irq_on_complete() {
                    irq.request(self.channels[i].irq_source);
                }
            }
        }
    }

    fn transfer_channel(&mut self, index: usize, bus: &mut dyn CpuBus) {
        let channel = &mut self.channels[index];
        let word_size = channel.word_size();
        let src_step = channel.src_control().step(word_size);
        let dst_step = channel.dst_control().step(word_size);
        let mut src = channel.src_addr;
        let mut dst = channel.dst_addr;
        for _ in 0..channel.words_remaining {
            if word_size == 4 {
                let value = bus.read32(src);
                bus.write32(dst, value);
            } else {
                let value = bus.read16(src);
                bus.write16(dst, value);
            }
            src = (i64::from(src) + src_step) as u32;
            dst = (i64::from(dst) + dst_step) as u32;
        }
        if channel.dst_control() == AddressControl::IncrementReload {
            channel.reload(ADDRESS_MASKS[index], COUNT_MASKS[index]);
        } else {
            channel.src_addr = src;
            channel.dst_addr = dst;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::cartridge::Cartridge;

    fn make_bus() -> Bus {
        Bus::new(vec![0u8; 0x4000], Cartridge::new(vec![0u8; 0x200], None))
    }

    #[test]
    fn immediate_dma_copies_words() {
        let mut io = IoRegs::new();
        let mut dma = Dma::new(&mut io);
        let irq = Irq::new(&mut io);
        let mut bus = make_bus();
        bus.write32(0x0200_0000, 0xdead_beef);

        io.write(BASE_ADDR, 4, 0x0200_0000);
        io.write(BASE_ADDR + 4, 4, 0x0200_1000);
        io.write(BASE_ADDR + 8, 2, 1);
        io.write(BASE_ADDR + 10, 2, (1 << 15) | (1 << 10));

        dma.run(&mut bus, &irq, DmaTiming::Immediate);

        assert_eq!(0xdead_beef, bus.read32(0x0200_1000));
    }

    #[test]
    fn completion_requests_irq_when_enabled() {
        let mut io = IoRegs::new();
        let mut dma = Dma::new(&mut io);
        let irq = Irq::new(&mut io);
        let mut bus = make_bus();

        io.write(BASE_ADDR, 4, 0x0200_0000);
        io.write(BASE_ADDR + 4, 4, 0x0200_1000);
        io.write(BASE_ADDR + 8, 2, 1);
        io.write(BASE_ADDR + 10, 2, (1 << 15) | (1 << 14) | (1 << 10));

        dma.run(&mut bus, &irq, DmaTiming::Immediate);

        let dma0_bit = 1 << 8;
        assert_eq!(dma0_bit, io.read(0x0202, 2) & dma0_bit);
    }

    #[test]
    fn channel1_special_routes_to_sound_queue_a_only_when_dest_matches_fifo_a() {
        let mut io = IoRegs::new();
        let mut dma = Dma::new(&mut io);
        let irq = Irq::new(&mut io);
        let mut bus = make_bus();

        let base = BASE_ADDR + CHANNEL_STRIDE; // channel 1
        io.write(base, 4, 0x0200_0000);
        io.write(base + 4, 4, FIFO_A_ADDR);
        io.write(base + 8, 2, 4);
        io.write(base + 10, 2, (1 << 15) | (1 << 10) | (3 << 12));

        // Wrong timing: must not fire as VBlank/HBlank/Immediate/SoundQueueB.
        dma.run(&mut bus, &irq, DmaTiming::SoundQueueB);
        assert_eq!(0, bus.read32(FIFO_A_ADDR));

        dma.run(&mut bus, &irq, DmaTiming::SoundQueueA);
        assert_ne!(0, io.read(base + 10, 2) & (1 << 15));
    }

    #[test]
    fn channel1_special_routes_to_sound_queue_b_when_dest_matches_fifo_b() {
        let mut io = IoRegs::new();
        let mut dma = Dma::new(&mut io);
        let irq = Irq::new(&mut io);
        let mut bus = make_bus();

        let base = BASE_ADDR + CHANNEL_STRIDE;
        io.write(base, 4, 0x0200_0000);
        io.write(base + 4, 4, FIFO_B_ADDR);
        io.write(base + 8, 2, 4);
        io.write(base + 10, 2, (1 << 15) | (1 << 10) | (3 << 12));

        // Wrong sound-queue timing must not fire the transfer.
        dma.run(&mut bus, &irq, DmaTiming::SoundQueueA);
        assert_ne!(0, io.read(base + 10, 2) & (1 << 15));

        dma.run(&mut bus, &irq, DmaTiming::SoundQueueB);
        assert_eq!(0, io.read(base + 10, 2) & (1 << 15));
    }

    #[test]
    fn channel3_special_routes_to_video_capture() {
        assert_eq!(DmaTiming::VideoCapture, DmaTiming::decode(3, 3, 0));
    }

    #[test]
    fn channel0_special_is_disabled_regardless_of_destination() {
        assert_eq!(DmaTiming::Disabled, DmaTiming::decode(3, 0, FIFO_A_ADDR));
    }

    #[test]
    fn channel2_special_also_routes_by_destination() {
        assert_eq!(DmaTiming::SoundQueueA, DmaTiming::decode(3, 2, FIFO_A_ADDR));
        assert_eq!(DmaTiming::SoundQueueB, DmaTiming::decode(3, 2, FIFO_B_ADDR));
        assert_eq!(DmaTiming::Disabled, DmaTiming::decode(3, 2, 0x0200_0000));
    }
}
