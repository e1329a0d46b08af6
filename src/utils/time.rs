//! Timestamp formatting for the transcript and log file names.

use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::macros::format_description;

/// ISO-8601 with second precision and no offset, e.g. `2024-05-01T13:45:09`.
const ISO_SECONDS: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// Compact stamp used in log file names, e.g. `20240501_134509`.
const FILE_STAMP: &[FormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]");

/// Returns the current local time, falling back to UTC when the local offset
/// cannot be determined.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Formats a timestamp as second-precision ISO-8601.
pub fn iso_seconds(datetime: OffsetDateTime) -> String {
    datetime
        .format(ISO_SECONDS)
        .unwrap_or_else(|_| datetime.unix_timestamp().to_string())
}

/// Formats a timestamp for use inside a file name.
pub fn file_stamp(datetime: OffsetDateTime) -> String {
    datetime
        .format(FILE_STAMP)
        .unwrap_or_else(|_| datetime.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn iso_seconds_drops_subseconds_and_offset() {
        let dt = datetime!(2024-05-01 13:45:09.123 +02:00);
        assert_eq!(iso_seconds(dt), "2024-05-01T13:45:09");
    }

    #[test]
    fn file_stamp_is_compact() {
        let dt = datetime!(2024-05-01 03:04:05 UTC);
        assert_eq!(file_stamp(dt), "20240501_030405");
    }
}
