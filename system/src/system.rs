// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! The system aggregate: every subsystem as a plain owned field rather than
//! the shared-ownership graph a tighter cross-wiring would need. The
//! scheduler is the only thing that ever touches more than one subsystem at
//! a time, ticking them in a fixed order and shuttling the small amount of
//! cross-subsystem signal (IRQ requests, DMA triggers, FIFO refills) as
//! plain return values and method calls instead of interior-mutable
//! back-references between subsystems.

use gbacore_emu::bus::Bus;
use gbacore_emu::cartridge::Cartridge;
use gbacore_emu::cpu::Cpu;
use gbacore_emu::dma::{Dma, DmaTiming};
use gbacore_emu::irq::Irq;
use gbacore_emu::keypad::Keypad;
use gbacore_emu::save::{Eeprom, Flash, FlashKind, SaveController};
use gbacore_emu::sound::Sound;
use gbacore_emu::timer::Timers;
use gbacore_emu::video::Video;

use crate::config::{Config, SaveHint};
use crate::error::CoreError;
use crate::savefile::SaveBlock;

const ENTRY_POINT: u32 = 0x0800_0000;

pub struct System {
    pub cpu: Cpu,
    pub bus: Bus,
    pub dma: Dma,
    pub timers: Timers,
    pub video: Video,
    pub sound: Sound,
    pub irq: Irq,
    pub keypad: Keypad,
}

fn build_save_controller(config: &Config) -> SaveController {
    let wide_eeprom = config.rom.len() <= 16 * 1024 * 1024;
    match config.save_hint {
        SaveHint::None => SaveController::None,
        SaveHint::Sram => SaveController::Sram(Default::default()),
        SaveHint::Flash512K => SaveController::Flash(Flash::new(FlashKind::Panasonic512K)),
        SaveHint::Flash1M => SaveController::Flash(Flash::new(FlashKind::Sanyo1M)),
        SaveHint::Eeprom => SaveController::Eeprom(Eeprom::new(wide_eeprom)),
        SaveHint::Auto => SaveController::Sram(Default::default()),
    }
}

impl System {
    pub fn new(config: Config) -> Self {
        let mut cartridge = Cartridge::new(config.rom.clone(), Some(build_save_controller(&config)));
        if config.rtc_enabled {
            cartridge.enable_rtc(config.day_of_week_offset);
        }

        let mut bus = Bus::new(config.bios.clone(), cartridge);
        let dma = Dma::new(&mut bus.io);
        let timers = Timers::new(&mut bus.io);
        let video = Video::new(&mut bus.io);
        let sound = Sound::new(&mut bus.io);
        let irq = Irq::new(&mut bus.io);
        let keypad = Keypad::new(&mut bus.io);

        let mut cpu = Cpu::new();
        if config.skip_bios {
            trace!("skip_bios set, entering cartridge code directly at {:#010x}", ENTRY_POINT);
            cpu.reset(ENTRY_POINT);
        } else {
            cpu.reset(0);
        }

        Self {
            cpu,
            bus,
            dma,
            timers,
            video,
            sound,
            irq,
            keypad,
        }
    }

    /// Runs exactly `instructions` CPU steps, dispatching every other
    /// subsystem in lockstep behind each one: DMA first (so an
    /// immediately-armed transfer lands before the instruction that armed
    /// it retires), then the CPU, then timers/video/sound/keypad, then the
    /// interrupt controller.
    pub fn emulate(&mut self, instructions: u32) {
        for _ in 0..instructions {
            self.bus.set_current_pc(self.cpu.regs.pc());
            self.dma.run(&mut self.bus, &self.irq, DmaTiming::Immediate);

            let cycles = self.cpu.step(&mut self.bus);

            self.timers.step(cycles, &self.irq);
            if self.timers.take_fifo_a_ticks() > 0 {
                self.sound.tick_fifo_a();
            }
            if self.timers.take_fifo_b_ticks() > 0 {
                self.sound.tick_fifo_b();
            }

            self.video.step(cycles, &self.bus.vram, &self.bus.palette, &self.bus.oam, &self.irq);
            if self.video.take_hblank_entered() {
                self.dma.run(&mut self.bus, &self.irq, DmaTiming::HBlank);
            }
            if self.video.take_vblank_entered() {
                self.dma.run(&mut self.bus, &self.irq, DmaTiming::VBlank);
            }

            self.sound.step(cycles);
            if self.sound.take_fifo_a_needs_refill() {
                self.dma.run(&mut self.bus, &self.irq, DmaTiming::SoundQueueA);
            }
            if self.sound.take_fifo_b_needs_refill() {
                self.dma.run(&mut self.bus, &self.irq, DmaTiming::SoundQueueB);
            }
            self.keypad.poll_irq(&self.irq);

            if self.irq.should_interrupt_cpu() {
                self.cpu.raise_irq();
            }
            if self.cpu.is_halted() && self.irq.should_wake_halt() {
                self.cpu.resume();
            }
        }
    }

    /// Takes the most recently completed frame, if one was rendered since
    /// the last call.
    pub fn take_frame(&mut self) -> Option<&[u16]> {
        self.video.take_frame()
    }

    /// Gathers every save block the cartridge currently has into the
    /// persisted-container shape, materializing RTC "current datetime"
    /// against `now_epoch_seconds`.
    pub fn export_save(&self, now_epoch_seconds: i64) -> Vec<SaveBlock> {
        let mut blocks = Vec::new();
        if let Some((kind, bytes)) = self.bus.cartridge.export_save() {
            blocks.push(SaveBlock { kind, bytes });
        }
        if let Some(rtc_bytes) = self.bus.cartridge.export_rtc(now_epoch_seconds) {
            blocks.push(SaveBlock {
                kind: gbacore_emu::save::SaveKind::Rtc,
                bytes: rtc_bytes.to_vec(),
            });
        }
        blocks
    }

    pub fn import_save(&mut self, blocks: &[SaveBlock]) -> Result<(), CoreError> {
        for block in blocks {
            if block.kind == gbacore_emu::save::SaveKind::Rtc {
                if block.bytes.len() != 24 {
                    continue;
                }
                let year = block.bytes[9];
                gbacore_emu::save::Rtc::validate_year(year).map_err(CoreError::RtcYearOutOfRange)?;
                let mut fixed = [0u8; 24];
                fixed.copy_from_slice(&block.bytes);
                self.bus.cartridge.import_rtc(&fixed);
            } else {
                self.bus.cartridge.save.import(&block.bytes);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_rom(rom: Vec<u8>) -> Config {
        Config::new(vec![0u8; gbacore_emu::bus::BIOS_SIZE], rom)
            .unwrap()
            .with_skip_bios(true)
    }

    #[test]
    fn new_system_starts_unhalted_at_entry_point() {
        let system = System::new(config_with_rom(vec![0u8; 0x100]));
        assert!(!system.cpu.is_halted());
        assert_eq!(ENTRY_POINT, system.cpu.regs.pc());
    }

    #[test]
    fn emulate_advances_pc_through_nop_like_stream() {
        let mut rom = vec![0u8; 0x100];
        // MOV r0, r0 encoded as ARM, repeated.
        let mov_r0_r0 = 0xe1a0_0000u32.to_le_bytes();
        for i in 0..4 {
            rom[i * 4..i * 4 + 4].copy_from_slice(&mov_r0_r0);
        }
        let mut system = System::new(config_with_rom(rom));
        system.emulate(4);
        assert_eq!(ENTRY_POINT + 16, system.cpu.regs.pc());
    }

    #[test]
    fn export_then_import_round_trips_sram() {
        let system0 = System::new(config_with_rom(vec![0u8; 0x100]));
        let blocks = system0.export_save(0);
        let mut system1 = System::new(config_with_rom(vec![0u8; 0x100]));
        assert!(system1.import_save(&blocks).is_ok());
    }
}
