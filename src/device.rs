// SPDX-License-Identifier: MIT OR Apache-2.0
//! The Device record: a physical board, located by serial port and (after
//! introspection) by runtime identity.

use std::fmt::{self, Display};

/// Family tag attached to a [Device] before and after introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Family
{
    Unknown,
    MicroPython,
    Other(String),
}

impl Default for Family
{
    fn default() -> Self
    {
        Family::Unknown
    }
}

impl Display for Family
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    {
        match self {
            Family::Unknown => write!(f, "unknown"),
            Family::MicroPython => write!(f, "micropython"),
            Family::Other(name) => write!(f, "{}", name),
        }
    }
}

impl Family
{
    pub fn from_raw(raw: &str) -> Self
    {
        match raw {
            "" | "unknown" => Family::Unknown,
            "micropython" => Family::MicroPython,
            other => Family::Other(other.to_string()),
        }
    }

    /// Whether this device is eligible for worklist construction (§4.5 step 1).
    pub fn eligible_for_worklist(&self) -> bool
    {
        matches!(self, Family::MicroPython | Family::Unknown)
    }
}

/// One physical board, identified by its serial port path.
///
/// Constructed from a port path, mutated exactly once by the introspector, then
/// treated as read-only for the remainder of its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device
{
    pub serial_port: String,
    pub family: Family,
    /// MicroPython "port" -- the architecture family name (`stm32`, `rp2`, `esp32`, ...).
    pub port: String,
    pub board_id: String,
    pub variant: Option<String>,
    pub cpu: String,
    pub arch: String,
    pub build: String,
    pub version: String,
    pub description: String,
}

impl Device
{
    /// A not-yet-introspected device, known only by its port path.
    pub fn new(serial_port: impl Into<String>) -> Self
    {
        Self {
            serial_port: serial_port.into(),
            family: Family::Unknown,
            port: String::new(),
            board_id: String::new(),
            variant: None,
            cpu: String::new(),
            arch: String::new(),
            build: String::new(),
            version: String::new(),
            description: String::new(),
        }
    }

    /// A synthetic device for the manual worklist path (§4.5), where the board
    /// identifier is supplied directly by the user rather than introspected.
    pub fn manual(serial_port: impl Into<String>, port: impl Into<String>, board_id: impl Into<String>) -> Self
    {
        Self {
            family: Family::MicroPython,
            port: port.into(),
            board_id: board_id.into(),
            ..Self::new(serial_port)
        }
    }
}

impl Display for Device
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    {
        write!(f, "{} ({} {}, {})", self.serial_port, self.board_id, self.version, self.family)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn unintrospected_device_is_unknown_but_eligible()
    {
        let device = Device::new("/dev/ttyACM0");
        assert_eq!(device.family, Family::Unknown);
        assert!(device.family.eligible_for_worklist());
    }

    #[test]
    fn non_micropython_family_is_ineligible()
    {
        let family = Family::from_raw("circuitpython");
        assert!(!family.eligible_for_worklist());
    }
}
