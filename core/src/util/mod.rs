// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

mod shared;

pub use self::shared::{new_shared, new_shared_cell, Shared, SharedCell};
