//! Output naming.

use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_TIMESTAMP_MS: AtomicI64 = AtomicI64::new(0);

/// Milliseconds since the epoch, strictly greater than any value previously
/// returned in this process.
pub fn next_timestamp_ms() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_TIMESTAMP_MS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_TIMESTAMP_MS.compare_exchange_weak(
            last,
            next,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

/// Builds `"{timestamp_ms}_{base name}"` for `source`.
///
/// Returns `None` if the source path has no file name.
pub fn output_name(source: &Path) -> Option<String> {
    let base = source.file_name()?.to_str()?;
    Some(format!("{}_{}", next_timestamp_ms(), base))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_strictly_increase() {
        let mut previous = next_timestamp_ms();
        for _ in 0..1000 {
            let next = next_timestamp_ms();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_output_name_format() {
        let name = output_name(Path::new("/videos/holiday.mp4")).unwrap();
        let (stamp, base) = name.split_once('_').unwrap();
        assert!(stamp.parse::<i64>().is_ok());
        assert_eq!(base, "holiday.mp4");
    }

    #[test]
    fn test_output_names_are_unique() {
        let a = output_name(Path::new("a.mp4")).unwrap();
        let b = output_name(Path::new("a.mp4")).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_output_name_without_base() {
        assert!(output_name(Path::new("/")).is_none());
    }
}
