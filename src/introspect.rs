// SPDX-License-Identifier: MIT OR Apache-2.0
//! Device Introspector (§4.2): runs a pre-canned identity script against a
//! device's interactive interpreter over its serial port and parses the
//! resulting identity record.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::device::{Device, Family};
use crate::error::{Error, ErrorKind, Result};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
const BAUD_RATE: u32 = 115200;

/// The on-device script run over the raw REPL. Prints a single brace-delimited
/// record and exits, matching the on-device identity contract (§6).
const IDENTITY_SCRIPT: &str = r#"import sys,os
try:
    import machine
except ImportError:
    machine = None
info = {}
try:
    u = os.uname()
    info["family"] = getattr(u, "sysname", "")
    info["version"] = getattr(u, "release", "")
    info["build"] = getattr(u, "version", "")
    info["port"] = getattr(u, "sysname", "")
    info["board"] = getattr(u, "machine", "")
except Exception:
    pass
try:
    info["mpy"] = sys.implementation._mpy if hasattr(sys.implementation, "_mpy") else ""
except Exception:
    info["mpy"] = ""
print(info)
"#;

const RESET_TAGS: &[&str] = &[
    "rst cause:1, boot mode:",
    "rst cause:2, boot mode:",
    "rst cause:3, boot mode:",
    "rst cause:4, boot mode:",
    "boot.esp32: PRO CPU has been reset by WDT.",
    "rst:0x10 (RTCWDT_RTC_RESET)",
];
const ERROR_TAGS: &[&str] = &["Traceback ", "Error: ", "Exception: "];
const WARNING_TAGS: &[&str] = &["WARNING:", "WARN  :"];
const IGNORE_TAGS: &[&str] = &["File \"<stdin>\","];

#[derive(Debug, PartialEq, Eq)]
enum LineClass
{
    Reset,
    Error,
    Warning,
    Ignore,
    Info,
}

fn classify(line: &str) -> LineClass
{
    if RESET_TAGS.iter().any(|tag| line.contains(tag)) {
        LineClass::Reset
    } else if ERROR_TAGS.iter().any(|tag| line.contains(tag)) {
        LineClass::Error
    } else if WARNING_TAGS.iter().any(|tag| line.contains(tag)) {
        LineClass::Warning
    } else if IGNORE_TAGS.iter().any(|tag| line.contains(tag)) {
        LineClass::Ignore
    } else {
        LineClass::Info
    }
}

/// Introspect the device at `port`, retrying up to [MAX_ATTEMPTS] times on any
/// connection/timeout failure.
pub fn introspect(port: &str) -> Result<Device>
{
    let mut last_err = None;
    for attempt in 1..=MAX_ATTEMPTS {
        match introspect_once(port, DEFAULT_TIMEOUT) {
            Ok(device) => return Ok(device),
            Err(err) => {
                warn!("introspection attempt {}/{} on {} failed: {}", attempt, MAX_ATTEMPTS, port, err);
                last_err = Some(err);
                if attempt < MAX_ATTEMPTS {
                    thread::sleep(RETRY_DELAY);
                }
            },
        }
    }
    Err(last_err.unwrap_or_else(|| ErrorKind::IntrospectionFailed(port.to_string()).error()))
}

fn introspect_once(port: &str, timeout: Duration) -> Result<Device>
{
    let mut conn = serialport::new(port, BAUD_RATE).timeout(timeout).open()?;

    // Enter raw REPL (Ctrl-A), send the script, execute it (Ctrl-D), then leave (Ctrl-B).
    conn.write_all(b"\r\x01")?;
    conn.write_all(IDENTITY_SCRIPT.as_bytes())?;
    conn.write_all(b"\x04")?;

    let record = read_record(&mut conn, port, timeout)?;
    conn.write_all(b"\x02").ok();

    Ok(parse_record(port, &record))
}

fn read_record(conn: &mut Box<dyn serialport::SerialPort>, port: &str, timeout: Duration) -> Result<String>
{
    let deadline = Instant::now() + timeout * MAX_ATTEMPTS;
    let mut reader = BufReader::new(conn);
    let mut line = String::new();

    loop {
        if Instant::now() > deadline {
            return Err(ErrorKind::IntrospectionFailed(port.to_string()).error());
        }

        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => return Err(ErrorKind::IntrospectionFailed(port.to_string()).error()),
            Ok(_) => {},
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
            Err(e) => return Err(Error::from(e)),
        }

        match classify(&line) {
            LineClass::Reset => return Err(ErrorKind::IntrospectionFailed(port.to_string()).error()),
            LineClass::Error => warn!("{}", line.trim_end()),
            LineClass::Warning => warn!("{}", line.trim_end()),
            LineClass::Ignore => continue,
            LineClass::Info => {},
        }

        if line.trim_start().starts_with('{') && line.trim_end().ends_with('}') {
            return Ok(line.trim().to_string());
        }
    }
}

/// Parse the brace-delimited dict-literal record the identity script prints.
///
/// Consumers must tolerate missing keys (§6); this parser is intentionally
/// forgiving of the Python-dict-repr syntax rather than requiring valid JSON.
/// Public so integration tests can exercise the real parser instead of
/// hand-building a [Device].
pub fn parse_record(port: &str, record: &str) -> Device
{
    let fields = parse_dict_literal(record);
    let mut device = Device::new(port);

    device.family = Family::from_raw(fields.get("family").map(String::as_str).unwrap_or(""));
    device.version = normalize_version(fields.get("version").map(String::as_str).unwrap_or(""));
    device.build = fields.get("build").cloned().unwrap_or_default();
    device.port = fields.get("port").cloned().unwrap_or_default();
    device.description = fields.get("board").cloned().unwrap_or_default();
    device.arch = fields.get("arch").cloned().unwrap_or_default();

    // `cpu` is derived host-side from "<BOARD> with <CHIP>" when the device did
    // not report it directly (§2.2 supplemented behavior).
    device.cpu = fields.get("cpu").cloned().filter(|s| !s.is_empty()).unwrap_or_else(|| {
        device.description.split_once(" with ").map(|(_, chip)| chip.trim().to_string()).unwrap_or_default()
    });

    device
}

/// Strip a trailing `.0` patch component, but only for the `1.10.x`-`1.19.x`
/// release range, matching the original on-device script's quirky
/// version-normalization behavior for that era of MicroPython releases.
fn normalize_version(raw: &str) -> String
{
    let trimmed = raw.trim();
    let parts: Vec<&str> = trimmed.split('.').collect();
    if let [major, minor, "0"] = parts[..] {
        if major == "1" {
            if let Ok(minor_num) = minor.parse::<u32>() {
                if (10..=19).contains(&minor_num) {
                    return format!("{}.{}", major, minor);
                }
            }
        }
    }
    trimmed.to_string()
}

fn parse_dict_literal(record: &str) -> HashMap<String, String>
{
    let inner = record.trim().trim_start_matches('{').trim_end_matches('}');
    let mut fields = HashMap::new();

    for entry in split_top_level(inner, ',') {
        if let Some((key, value)) = entry.split_once(':') {
            let key = key.trim().trim_matches(|c| c == '\'' || c == '"').to_string();
            let value = value.trim().trim_matches(|c| c == '\'' || c == '"').to_string();
            if !key.is_empty() {
                fields.insert(key, value);
            }
        }
    }

    fields
}

fn split_top_level(input: &str, separator: char) -> Vec<String>
{
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let mut in_quote: Option<char> = None;

    for c in input.chars() {
        match in_quote {
            Some(q) if c == q => in_quote = None,
            Some(_) => {},
            None => match c {
                '\'' | '"' => in_quote = Some(c),
                '{' | '[' | '(' => depth += 1,
                '}' | ']' | ')' => depth -= 1,
                c if c == separator && depth == 0 => {
                    parts.push(std::mem::take(&mut current));
                    continue;
                },
                _ => {},
            },
        }
        current.push(c);
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn reset_tag_classifies_as_reset()
    {
        assert_eq!(classify("rst cause:2, boot mode:(1,7)"), LineClass::Reset);
    }

    #[test]
    fn plain_output_classifies_as_info()
    {
        assert_eq!(classify("hello world"), LineClass::Info);
    }

    #[test]
    fn record_parses_nested_board_and_cpu_fallback()
    {
        let device = parse_record(
            "COM3",
            "{'family': 'micropython', 'version': '1.22.0', 'build': '', 'port': 'stm32', 'board': 'NUCLEO-WB55 with STM32WB55RGV6', 'cpu': '', 'arch': 'armv7emsp'}",
        );
        assert_eq!(device.family, Family::MicroPython);
        assert_eq!(device.version, "1.22.0");
        assert_eq!(device.port, "stm32");
        assert_eq!(device.cpu, "STM32WB55RGV6");
    }

    #[test]
    fn version_strips_trailing_zero_release()
    {
        assert_eq!(normalize_version("1.19.0"), "1.19");
        assert_eq!(normalize_version("1.19.1"), "1.19.1");
    }

    #[test]
    fn missing_keys_default_to_empty()
    {
        let device = parse_record("COM3", "{'family': 'unknown'}");
        assert_eq!(device.port, "");
        assert_eq!(device.cpu, "");
    }
}
