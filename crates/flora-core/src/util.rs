//! Utility functions for flora-core.

use btleplug::platform::PeripheralId;

/// Normalize a radio address for comparison.
///
/// Addresses are compared case-insensitively; configuration may use
/// `C4:7C:8D:..` while the radio stack reports `c4:7c:8d:..`.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Whether `address` looks like a MAC address or a CoreBluetooth UUID.
pub fn is_valid_address(address: &str) -> bool {
    let address = address.trim();
    let is_mac = address.len() == 17
        && address.split(':').count() == 6
        && address
            .split(':')
            .all(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit()));

    is_mac || uuid::Uuid::parse_str(address).is_ok()
}

/// Format a peripheral ID as a string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms, they may be
/// MAC addresses or other formats.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Create a normalized identifier from an address and peripheral ID.
///
/// On macOS where addresses are 00:00:00:00:00:00, uses the peripheral ID.
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if address == "00:00:00:00:00:00" {
        normalize_address(&format_peripheral_id(peripheral_id))
    } else {
        normalize_address(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("C4:7C:8D:6A:12:34"), "c4:7c:8d:6a:12:34");
        assert_eq!(normalize_address("  c4:7c:8d:6a:12:34 "), "c4:7c:8d:6a:12:34");
    }

    #[test]
    fn test_valid_mac_address() {
        assert!(is_valid_address("C4:7C:8D:6A:12:34"));
        assert!(is_valid_address("c4:7c:8d:6a:12:34"));
    }

    #[test]
    fn test_valid_uuid_address() {
        assert!(is_valid_address("5f3b3c9e-2a7d-4f2b-9a1e-0c8f1d2e3a4b"));
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("MiFlora"));
        assert!(!is_valid_address("C4:7C:8D:6A:12"));
        assert!(!is_valid_address("C4:7C:8D:6A:12:ZZ"));
        assert!(!is_valid_address("C47C8D6A1234"));
    }
}
