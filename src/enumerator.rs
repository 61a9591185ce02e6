// SPDX-License-Identifier: MIT OR Apache-2.0
//! Device Enumerator (§4.1): lists candidate serial ports, filtered by
//! include/ignore glob patterns and optionally excluding Bluetooth ports.

use glob::Pattern;
use log::debug;
use serialport::SerialPortType;

use crate::error::Result;

const BLUETOOTH_DESCRIPTION_HINTS: &[&str] = &["bluetooth", "bt "];
const BLUETOOTH_HWID_PREFIXES: &[&str] = &["BTHENUM", "BLUETOOTHDEVICE"];

/// List port paths matching `include` and not matching `ignore`, in platform-natural
/// order (numeric by trailing integer on Windows, lexicographic elsewhere).
pub fn enumerate_ports(include: &[String], ignore: &[String], bluetooth: bool) -> Result<Vec<String>>
{
    let ports = serialport::available_ports()?;

    let mut matched: Vec<String> = ports
        .into_iter()
        .filter(|port| bluetooth || !is_bluetooth(port))
        .map(|port| port.port_name)
        .filter(|name| matches_any(include, name) && !matches_any(ignore, name))
        .collect();

    sort_natural(&mut matched);
    debug!("enumerated {} matching port(s)", matched.len());
    Ok(matched)
}

fn is_bluetooth(port: &serialport::SerialPortInfo) -> bool
{
    if let SerialPortType::UsbPort(info) = &port.port_type {
        if let Some(product) = &info.product {
            let lower = product.to_lowercase();
            if BLUETOOTH_DESCRIPTION_HINTS.iter().any(|hint| lower.contains(hint)) {
                return true;
            }
        }
    }
    BLUETOOTH_HWID_PREFIXES.iter().any(|prefix| port.port_name.to_uppercase().starts_with(prefix))
}

fn matches_any(patterns: &[String], name: &str) -> bool
{
    if patterns.is_empty() {
        // An empty include list matches nothing (§8 boundary behavior); an empty
        // ignore list excludes nothing, handled by the caller via `!matches_any`.
        return false;
    }

    patterns.iter().any(|pattern| {
        pattern == "*" || Pattern::new(pattern).map(|glob| glob.matches(name)).unwrap_or(pattern == name)
    })
}

fn sort_natural(ports: &mut [String])
{
    if cfg!(windows) {
        ports.sort_by_key(|name| trailing_number(name).unwrap_or(i64::MAX));
    } else {
        ports.sort();
    }
}

fn trailing_number(name: &str) -> Option<i64>
{
    let digits: String = name.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.chars().rev().collect::<String>().parse().ok()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn empty_include_yields_nothing_even_with_ignore()
    {
        assert!(!matches_any(&[], "COM3"));
    }

    #[test]
    fn star_matches_everything()
    {
        assert!(matches_any(&["*".to_string()], "/dev/ttyACM0"));
    }

    #[test]
    fn empty_ignore_excludes_nothing()
    {
        // Callers negate matches_any() for the ignore list; an empty ignore list
        // must therefore match nothing so negation keeps every port.
        assert!(!matches_any(&[], "COM3"));
    }

    #[test]
    fn glob_pattern_matches_prefix()
    {
        assert!(matches_any(&["/dev/ttyACM*".to_string()], "/dev/ttyACM0"));
        assert!(!matches_any(&["/dev/ttyACM*".to_string()], "/dev/ttyUSB0"));
    }

    #[test]
    fn windows_ordering_is_numeric()
    {
        let mut ports = vec!["COM10".to_string(), "COM2".to_string(), "COM1".to_string()];
        ports.sort_by_key(|name| trailing_number(name).unwrap_or(i64::MAX));
        assert_eq!(ports, vec!["COM1", "COM2", "COM10"]);
    }

    #[test]
    fn posix_ordering_is_lexicographic()
    {
        let mut ports = vec!["/dev/ttyUSB10".to_string(), "/dev/ttyUSB2".to_string()];
        ports.sort();
        assert_eq!(ports, vec!["/dev/ttyUSB10", "/dev/ttyUSB2"]);
    }
}
