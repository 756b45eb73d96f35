use std::sync::OnceLock;

use crate::Result;

/// The local UTC offset, determined on the first call. The first call should happen before any
/// threads are spawned, see [`time::UtcOffset::current_local_offset`] for why.
pub fn local_offset() -> Result<time::UtcOffset, time::error::IndeterminateOffset> {
    static CACHE: OnceLock<Result<time::UtcOffset, time::error::IndeterminateOffset>> =
        OnceLock::new();
    *CACHE.get_or_init(time::UtcOffset::current_local_offset)
}

/// The local offset, or UTC when it can not be determined.
pub fn display_offset() -> time::UtcOffset {
    local_offset().unwrap_or(time::UtcOffset::UTC)
}

pub fn format_offset(value: time::UtcOffset) -> Result<String> {
    let fd = time::macros::format_description!("[offset_hour sign:mandatory]:[offset_minute]");
    Ok(value.format(fd)?)
}

pub fn format_time(value: time::OffsetDateTime, offset: time::UtcOffset) -> Result<String> {
    let fd = time::macros::format_description!("[hour]:[minute]:[second]");
    Ok(value.to_offset(offset).format(fd)?)
}

#[cfg(test)]
mod tests {
    use time::macros::{datetime, offset};

    use super::*;

    #[test]
    fn formats_offsets() {
        assert_eq!(format_offset(offset!(UTC)).unwrap(), "+00:00");
        assert_eq!(format_offset(offset!(+5:30)).unwrap(), "+05:30");
        assert_eq!(format_offset(offset!(-3)).unwrap(), "-03:00");
    }

    #[test]
    fn formats_times_in_offset() {
        let value = datetime!(2024-01-01 12:30:05 UTC);
        assert_eq!(format_time(value, offset!(+2)).unwrap(), "14:30:05");
    }
}
