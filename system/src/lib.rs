// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

#[macro_use]
extern crate log;

pub mod clock;
pub mod config;
pub mod error;
pub mod savefile;
pub mod system;

pub use clock::now_epoch_seconds;
pub use config::{Config, SaveHint};
pub use error::{ConfigError, CoreError};
pub use system::System;
