//! Report rendering and delivery.

pub mod delivery;
pub mod email;
pub mod html;

use chrono::{DateTime, Utc};

pub use delivery::Delivery;
pub use html::render;

/// Marker shown when an entry carries no size
pub const SIZE_UNAVAILABLE: &str = "N/A";

/// A rendered report, ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub subject: String,
    pub html: String,
    pub entry_count: usize,
}

/// Inputs to rendering that do not come from the entries themselves
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub generated_at: DateTime<Utc>,
    pub host: String,
}

impl ReportContext {
    pub fn now() -> Self {
        Self {
            generated_at: Utc::now(),
            host: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

/// Format a byte count on a binary scale, or the unavailable marker
pub fn format_size(size: Option<u64>) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    let Some(bytes) = size else {
        return SIZE_UNAVAILABLE.to_string();
    };

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.1} {}", size, UNITS[unit_index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(Some(0)), "0.0 B");
        assert_eq!(format_size(Some(1023)), "1023.0 B");
        assert_eq!(format_size(Some(1024)), "1.0 KB");
        assert_eq!(format_size(Some(1536)), "1.5 KB");
        assert_eq!(format_size(Some(1024 * 1024)), "1.0 MB");
        assert_eq!(format_size(Some(1024 * 1024 * 1024)), "1.0 GB");
        assert_eq!(format_size(Some(1024_u64.pow(4))), "1.0 TB");
        assert_eq!(format_size(Some(1024_u64.pow(5))), "1.0 PB");
        assert_eq!(format_size(Some(1024_u64.pow(6))), "1024.0 PB");
    }

    #[test]
    fn test_format_size_unavailable() {
        assert_eq!(format_size(None), "N/A");
    }

    #[test]
    fn test_format_size_unit_escalation() {
        let units = ["B", "KB", "MB", "GB", "TB", "PB"];
        for k in 1..units.len() as u32 {
            let boundary = 1024_u64.pow(k);
            let below = format_size(Some(boundary - 1));
            let at = format_size(Some(boundary));
            assert!(below.ends_with(&format!(" {}", units[k as usize - 1])), "{below}");
            assert!(at.ends_with(&format!(" {}", units[k as usize])), "{at}");
        }
    }
}
