// This file is part of gbacore.
// Licensed under the MIT OR Apache-2.0 license. See LICENSE files in the project root.

//! Host wall-clock acquisition, kept out of [`System`](crate::System) itself
//! so the emulation core never reads the clock on its own -- callers pass a
//! timestamp into `export_save`/RTC explicitly, which keeps a run
//! reproducible from a fixed input. This is the one place that timestamp
//! is expected to come from.

use time::OffsetDateTime;

/// Seconds since the Unix epoch, suitable for `System::export_save` and the
/// GPIO-routed RTC's `now_epoch_seconds` parameter.
pub fn now_epoch_seconds() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_after_the_year_2000() {
        assert!(now_epoch_seconds() > 946_684_800);
    }
}
