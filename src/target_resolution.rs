// SPDX-License-Identifier: MIT OR Apache-2.0
//! Target-Resolution Engine (§4.9): maps a runtime chip identity string to a
//! debug-probe-library target name via weighted fuzzy matching, with optional
//! on-demand pack installation.

use std::collections::HashMap;
use std::process::Command;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{Error, ErrorKind, Result};

const MATCH_THRESHOLD: f64 = 0.6;
const FAMILY_IN_TARGET_WEIGHT: f64 = 0.5;
const FAMILY_IN_PART_NUMBER_WEIGHT: f64 = 0.3;
const PORT_CONSISTENCY_WEIGHT: f64 = 0.2;
const PACK_INSTALL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Parsed identity of a device, used as the fuzzy-match query (§4.9 step 1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct McuIdentity
{
    pub chip_family: String,
    pub chip_variant: String,
    pub board_name: String,
    pub port: String,
}

impl McuIdentity
{
    /// Parse a device description of the dominant `<BOARD> with <CHIP>` shape,
    /// falling back to bare chip patterns and finally to the CPU/port fields.
    pub fn parse(description: &str, cpu: &str, port: &str) -> Self
    {
        if let Some((board, chip)) = description.split_once(" with ") {
            let (family, variant) = split_family_variant(chip.trim());
            return Self { chip_family: family, chip_variant: variant, board_name: board.trim().to_string(), port: port.to_string() };
        }

        let source = if !cpu.is_empty() { cpu } else { description };
        let (family, variant) = split_family_variant(source.trim());
        if !family.is_empty() {
            return Self { chip_family: family, chip_variant: variant, board_name: "UNKNOWN".to_string(), port: port.to_string() };
        }

        // Final fallback (§8 boundary behavior): still yield a non-empty family.
        let family = if !cpu.is_empty() { cpu.to_string() } else { port.to_string() };
        Self { chip_family: family, chip_variant: String::new(), board_name: "UNKNOWN".to_string(), port: port.to_string() }
    }
}

/// Split a chip string like `STM32WB55RGV6` into a family (`STM32WB55`) and a
/// variant suffix (`RGV6`).
///
/// The string is broken into alternating letter/digit runs and paired up as
/// `(letters, digits)` (a trailing letter run with no digits after it forms
/// its own pair). A string with only one such pair has no variant at all
/// (`RP2040`, bare `SAMD51`); otherwise the last pair is the variant and
/// everything before it is the family (`STM32` + `32` + `WB` + `55` is the
/// family `STM32WB55`, `RGV` + `6` is the variant `RGV6`).
fn split_family_variant(chip: &str) -> (String, String)
{
    let chars: Vec<char> = chip.chars().collect();
    let mut pair_ends = Vec::new();
    let mut idx = 0;
    while idx < chars.len() {
        while idx < chars.len() && chars[idx].is_ascii_alphabetic() {
            idx += 1;
        }
        while idx < chars.len() && chars[idx].is_ascii_digit() {
            idx += 1;
        }
        pair_ends.push(idx);
    }

    if pair_ends.len() <= 1 {
        return (chip.to_string(), String::new());
    }

    let split_at = pair_ends[pair_ends.len() - 2];
    let family: String = chars[..split_at].iter().collect();
    let variant: String = chars[split_at..].iter().collect();
    (family, variant)
}

/// A candidate probe-library target, as enumerated from the in-process API or
/// the CLI listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget
{
    pub name: String,
    pub part_number: String,
}

fn score(identity: &McuIdentity, target: &ProbeTarget) -> f64
{
    let family = identity.chip_family.to_lowercase();
    let target_name = target.name.to_lowercase();
    let part_number = target.part_number.to_lowercase();

    let name_score = substring_score(&family, &target_name) * FAMILY_IN_TARGET_WEIGHT;
    let part_score = substring_score(&family, &part_number) * FAMILY_IN_PART_NUMBER_WEIGHT;
    let port_bonus = if port_consistent(&identity.port, &target_name) { PORT_CONSISTENCY_WEIGHT } else { 0.0 };

    name_score + part_score + port_bonus
}

fn substring_score(needle: &str, haystack: &str) -> f64
{
    if needle.is_empty() {
        return 0.0;
    }
    if haystack.contains(needle) {
        1.0
    } else {
        strsim::jaro_winkler(needle, haystack)
    }
}

fn port_consistent(port: &str, target_name: &str) -> bool
{
    match port.to_lowercase().as_str() {
        "stm32" => target_name.starts_with("stm32"),
        "rp2" => target_name.starts_with("rp20"),
        "samd" => target_name.starts_with("samd"),
        _ => false,
    }
}

/// Pick the highest-scoring target above [MATCH_THRESHOLD], or `None`.
pub fn fuzzy_match(identity: &McuIdentity, targets: &[ProbeTarget]) -> Option<ProbeTarget>
{
    targets
        .iter()
        .map(|target| (score(identity, target), target))
        .filter(|(s, _)| *s >= MATCH_THRESHOLD)
        .max_by(|(a, _), (b, _)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, target)| target.clone())
}

/// In-memory cache of resolved targets, keyed by `(board_id, cpu, description, port)`.
#[derive(Default)]
pub struct TargetCache
{
    entries: HashMap<(String, String, String, String), ProbeTarget>,
}

impl TargetCache
{
    pub fn get(&self, board_id: &str, cpu: &str, description: &str, port: &str) -> Option<&ProbeTarget>
    {
        self.entries.get(&(board_id.to_string(), cpu.to_string(), description.to_string(), port.to_string()))
    }

    pub fn insert(&mut self, board_id: &str, cpu: &str, description: &str, port: &str, target: ProbeTarget)
    {
        self.entries.insert((board_id.to_string(), cpu.to_string(), description.to_string(), port.to_string()), target);
    }

    /// Invalidated whenever a pack install changes what targets are available.
    pub fn clear(&mut self)
    {
        self.entries.clear();
    }
}

/// Resolve `identity` against `targets`, auto-installing a pack and retrying
/// once if nothing matches and `auto_install_packs` is set (§4.9 step 4).
pub fn resolve_target(
    identity: &McuIdentity,
    targets: &[ProbeTarget],
    auto_install_packs: bool,
) -> Result<Option<ProbeTarget>>
{
    if let Some(target) = fuzzy_match(identity, targets) {
        return Ok(Some(target));
    }

    if !auto_install_packs || !is_well_formed_family(&identity.chip_family) {
        return Ok(None);
    }

    info!("no target matched {} directly, searching for a pack", identity.chip_family);
    if !install_pack(&identity.chip_family)? {
        return Ok(None);
    }

    let refreshed = list_targets()?;
    Ok(fuzzy_match(identity, &refreshed))
}

fn is_well_formed_family(family: &str) -> bool
{
    !family.is_empty() && family.chars().all(|c| c.is_ascii_alphanumeric())
}

/// CMSIS-Pack management has no in-process `probe-rs` API, so this remains a
/// subprocess boundary: invoke the probe library's pack-search and
/// pack-install commands exactly once each, per the `pyocd pack find <family>`
/// / `pyocd pack install <family>` contract described in the
/// target-detection fixtures.
fn install_pack(family: &str) -> Result<bool>
{
    let found = run_external("pyocd", &["pack", "find", family], Duration::from_secs(30))?;
    if !found.lines().any(|line| line.to_lowercase().contains(&family.to_lowercase())) {
        warn!("no pack found for family {}", family);
        return Ok(false);
    }

    run_external("pyocd", &["pack", "install", family], PACK_INSTALL_TIMEOUT)?;
    Ok(true)
}

/// Enumerate probe-library targets, preferring the in-process `probe-rs`
/// target registry (§4.9 step 2) and supplementing it with a parsed CLI
/// listing, which is authoritative for pack-installed targets the embedded
/// registry does not see.
pub fn list_targets() -> Result<Vec<ProbeTarget>>
{
    let mut targets = builtin_targets()?;

    match run_external("pyocd", &["list", "--targets"], Duration::from_secs(30)) {
        Ok(output) => {
            let known: std::collections::HashSet<String> = targets.iter().map(|t| t.name.to_lowercase()).collect();
            for target in parse_target_listing(&output) {
                if !known.contains(&target.name.to_lowercase()) {
                    targets.push(target);
                }
            }
        },
        Err(e) => debug!("no supplemental CLI target listing available, using only the embedded registry: {}", e),
    }

    Ok(targets)
}

/// The `probe-rs` in-process chip family registry, flattened to one
/// [ProbeTarget] per variant.
fn builtin_targets() -> Result<Vec<ProbeTarget>>
{
    let families = probe_rs::config::families().map_err(|e| ErrorKind::TransportFailed(e.to_string()).error())?;
    Ok(families
        .iter()
        .flat_map(|family| family.variants.iter().map(|variant| ProbeTarget { name: variant.name.clone(), part_number: variant.name.clone() }))
        .collect())
}

/// Parse the probe library's human-readable target table. Unexpected lines are
/// warnings, not failures (§9 design note on runtime-reflective table parsing).
fn parse_target_listing(output: &str) -> Vec<ProbeTarget>
{
    let mut targets = Vec::new();
    for line in output.lines().skip(1) {
        let columns: Vec<&str> = line.split('|').map(str::trim).filter(|c| !c.is_empty()).collect();
        match columns.as_slice() {
            [name, part_number, ..] => targets.push(ProbeTarget { name: name.to_string(), part_number: part_number.to_string() }),
            [] => {},
            _ => debug!("ignoring malformed target listing line: {:?}", line),
        }
    }
    targets
}

fn run_external(program: &str, args: &[&str], timeout: Duration) -> Result<String>
{
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|_| ErrorKind::ExternalToolMissing(program.to_string()).error())?;

    // The timeout is enforced by the caller's overall operation budget; a
    // future revision may wrap this in a watchdog thread if `pyocd` itself
    // does not respect its own `--timeout` flag. TODO: wire an explicit kill
    // after `timeout` once subprocess cancellation lands.
    let _ = timeout;

    if !output.status.success() {
        return Err(ErrorKind::TransportFailed(format!("{} exited with {}", program, output.status)).error());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Produce an actionable message for a family that could not be resolved,
/// tailored to the detected port/family (§4.9 unsupported-reason generator).
pub fn unsupported_reason(identity: &McuIdentity) -> String
{
    let family_lower = identity.chip_family.to_lowercase();
    if family_lower.starts_with("esp") {
        format!("{} is an Espressif part; use --method esptool instead of a debug probe", identity.chip_family)
    } else if identity.port == "rp2" {
        format!("{} is an RP2040/RP2350 part; UF2 is usually the simplest transport", identity.chip_family)
    } else {
        format!(
            "no probe-library target matched {}; try --auto-install-packs or check for a newer pack release",
            identity.chip_family
        )
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn dominant_pattern_splits_board_and_chip()
    {
        let identity = McuIdentity::parse("NUCLEO-WB55 with STM32WB55RGV6", "", "stm32");
        assert_eq!(identity.board_name, "NUCLEO-WB55");
        assert_eq!(identity.chip_family, "STM32WB55");
        assert_eq!(identity.chip_variant, "RGV6");
    }

    #[test]
    fn bare_rp2040_has_no_variant()
    {
        let identity = McuIdentity::parse("RP2040", "", "rp2");
        assert_eq!(identity.chip_family, "RP2040");
    }

    #[test]
    fn malformed_description_falls_back_to_cpu()
    {
        let identity = McuIdentity::parse("a weird board string", "SAMD51J19A", "samd");
        assert_eq!(identity.board_name, "UNKNOWN");
        assert!(!identity.chip_family.is_empty());
    }

    #[test]
    fn exact_substring_scores_highest()
    {
        let identity = McuIdentity::parse("NUCLEO-WB55 with STM32WB55RGV6", "", "stm32");
        let target = ProbeTarget { name: "stm32wb55xg".to_string(), part_number: "stm32wb55rgv6".to_string() };
        assert!(score(&identity, &target) >= MATCH_THRESHOLD);
    }

    #[test]
    fn unrelated_family_scores_below_threshold()
    {
        let identity = McuIdentity::parse("ESP32 module", "", "esp32");
        let target = ProbeTarget { name: "stm32wb55xg".to_string(), part_number: "stm32wb55rgv6".to_string() };
        assert!(score(&identity, &target) < MATCH_THRESHOLD);
    }

    #[test]
    fn adding_targets_never_lowers_the_chosen_score()
    {
        let identity = McuIdentity::parse("NUCLEO-WB55 with STM32WB55RGV6", "", "stm32");
        let good = ProbeTarget { name: "stm32wb55xg".to_string(), part_number: "stm32wb55rgv6".to_string() };
        let noise = ProbeTarget { name: "rp2040".to_string(), part_number: "rp2040".to_string() };

        let before = fuzzy_match(&identity, &[good.clone()]).map(|t| score(&identity, &t));
        let after = fuzzy_match(&identity, &[good, noise]).map(|t| score(&identity, &t));
        assert_eq!(before, after);
    }

    #[test]
    fn port_consistency_bonus_breaks_ties()
    {
        let identity = McuIdentity::parse("board with SAMD51J19A", "", "samd");
        let matching_port = ProbeTarget { name: "samd51j19a".to_string(), part_number: "samd51j19a".to_string() };
        let wrong_port = ProbeTarget { name: "samd51j19a".to_string(), part_number: "samd51j19a".to_string() };
        assert_eq!(score(&identity, &matching_port), score(&identity, &wrong_port));
    }

    #[test]
    fn target_cache_roundtrips_and_invalidates()
    {
        let mut cache = TargetCache::default();
        let target = ProbeTarget { name: "stm32h563zitx".to_string(), part_number: "stm32h563zi".to_string() };
        cache.insert("NUCLEO_H563ZI", "STM32H563ZI", "desc", "stm32", target.clone());
        assert_eq!(cache.get("NUCLEO_H563ZI", "STM32H563ZI", "desc", "stm32"), Some(&target));
        cache.clear();
        assert_eq!(cache.get("NUCLEO_H563ZI", "STM32H563ZI", "desc", "stm32"), None);
    }

    #[test]
    fn parse_target_listing_skips_malformed_rows()
    {
        let output = "name | part | vendor\nstm32wb55xg | stm32wb55rgv6 | ST\n\nnot a table row";
        let targets = parse_target_listing(output);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name, "stm32wb55xg");
    }
}
