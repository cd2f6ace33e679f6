//! Upload progress values and their human-readable forms.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes sent so far out of the total for one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Bytes transferred so far
    pub loaded: u64,
    /// Total bytes to transfer
    pub total: u64,
}

impl Progress {
    /// Create a progress value
    #[must_use]
    pub const fn new(loaded: u64, total: u64) -> Self {
        Self { loaded, total }
    }

    /// Completion percentage, truncated and clamped to `0..=100`
    ///
    /// An empty upload (`total == 0`) counts as complete.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let percent = u128::from(self.loaded) * 100 / u128::from(self.total);
        percent.min(100) as u8
    }

    /// Completion fraction (0.0 to 1.0)
    #[must_use]
    pub fn fraction(&self) -> f64 {
        f64::from(self.percent()) / 100.0
    }

    /// Check if every byte has been sent
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.loaded >= self.total
    }

    /// "`<loaded>` of `<total>`" label for a file row
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} of {}", format_bytes(self.loaded), format_bytes(self.total))
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

/// Human-readable byte count for file rows
///
/// Whole bytes below 1 KB, two decimals above.
///
/// # Example
///
/// ```
/// use upqueue_core::progress::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1024), "1.00 KB");
/// assert_eq!(format_bytes(3 * 1024 * 1024 / 2), "1.50 MB");
/// ```
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const SCALED: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = SCALED[0];
    for &next in &SCALED[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.2} {unit}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(Progress::new(50, 200).percent(), 25);
        assert_eq!(Progress::new(50, 100).percent(), 50);
        assert_eq!(Progress::new(0, 100).percent(), 0);
        assert_eq!(Progress::new(100, 100).percent(), 100);
    }

    #[test]
    fn test_percent_truncates() {
        assert_eq!(Progress::new(1, 3).percent(), 33);
        assert_eq!(Progress::new(999, 1000).percent(), 99);
    }

    #[test]
    fn test_percent_clamped() {
        assert_eq!(Progress::new(300, 200).percent(), 100);
        assert_eq!(Progress::new(u64::MAX, 1).percent(), 100);
        assert_eq!(Progress::new(0, 0).percent(), 100);
    }

    #[test]
    fn test_fraction_and_display() {
        let progress = Progress::new(50, 200);
        assert_eq!(progress.fraction(), 0.25);
        assert_eq!(progress.to_string(), "25%");
        assert!(!progress.is_complete());
        assert!(Progress::new(200, 200).is_complete());
    }

    #[test]
    fn test_label() {
        assert_eq!(Progress::new(512, 2048).label(), "512 B of 2.00 KB");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.00 GB");
        assert_eq!(format_bytes(1024_u64.pow(4)), "1.00 TB");
        assert_eq!(format_bytes(2048 * 1024_u64.pow(4)), "2048.00 TB");
    }

    proptest::proptest! {
        #[test]
        fn prop_percent_close_to_ratio(loaded in 0u64..1_000_000, total in 1u64..1_000_000) {
            let percent = Progress::new(loaded, total).percent();
            let ratio = (loaded as f64 / total as f64 * 100.0).min(100.0);
            proptest::prop_assert!(f64::from(percent) <= ratio + 1e-9);
            proptest::prop_assert!(ratio - f64::from(percent) < 1.0 + 1e-9);
        }
    }
}
