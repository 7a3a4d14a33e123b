// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! The error taxonomy: configuration problems caught before a system can be
//! built, and core faults raised once it's running.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("bios image must be exactly {expected:#x} bytes, got {actual:#x}")]
    BadBiosSize { expected: usize, actual: usize },

    #[error("rom image of {actual:#x} bytes exceeds the {limit:#x} byte cartridge address space")]
    RomTooLarge { actual: usize, limit: usize },

    #[error("save file failed its checksum: {0}")]
    CorruptSave(String),
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("a DMA channel requested timing that can never be reached from the current display state")]
    DmaTimingUnreachable,

    #[error("video capture DMA is not supported by this core")]
    VideoCaptureUnsupported,

    #[error("rtc year {0} is outside the representable range [2000, 2099]")]
    RtcYearOutOfRange(u16),
}
