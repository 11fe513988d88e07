//! Human-readable byte counts for the file label.

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Format a byte count as `"N bytes"`, `"N.N KB"` or `"N.N MB"`.
///
/// Binary units, one decimal place, no GB tier: an image that size would
/// not get past the service's upload limit anyway.
pub fn format_size(bytes: u64) -> String {
    if bytes < KIB {
        format!("{bytes} bytes")
    } else if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries() {
        assert_eq!(format_size(0), "0 bytes");
        assert_eq!(format_size(1023), "1023 bytes");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1_048_575), "1024.0 KB");
        assert_eq!(format_size(1_048_576), "1.0 MB");
        assert_eq!(format_size(2_097_152), "2.0 MB");
    }

    #[test]
    fn one_decimal_place() {
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5_400_000), "5.1 MB");
    }
}
