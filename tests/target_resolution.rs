// SPDX-License-Identifier: MIT OR Apache-2.0
//! Target-resolution scenarios against a multi-candidate pool, mirroring the
//! fuzzy-matching fixtures this behavior was ported from.

use mpflash::target_resolution::{fuzzy_match, resolve_target, McuIdentity, ProbeTarget};

fn targets() -> Vec<ProbeTarget>
{
    vec![
        ProbeTarget { name: "stm32f429xi".to_string(), part_number: "stm32f429zitx".to_string() },
        ProbeTarget { name: "stm32wb55xg".to_string(), part_number: "stm32wb55rgv6".to_string() },
        ProbeTarget { name: "rp2040".to_string(), part_number: "rp2040".to_string() },
        ProbeTarget { name: "samd51j19a".to_string(), part_number: "samd51j19a".to_string() },
    ]
}

#[test]
fn picks_the_matching_family_out_of_several_candidates()
{
    let identity = McuIdentity::parse("NUCLEO-F429ZI with STM32F429ZI", "", "stm32");
    let matched = fuzzy_match(&identity, &targets()).expect("should match a target");
    assert_eq!(matched.name, "stm32f429xi");
}

#[test]
fn port_mismatch_does_not_prevent_a_strong_family_match()
{
    // The original chip-detection corpus notes that an unexpected port string
    // should not block a match when the family substring is decisive.
    let identity = McuIdentity::parse("board with STM32F429ZI", "", "unknown");
    let matched = fuzzy_match(&identity, &targets()).expect("should still match via substring score alone");
    assert_eq!(matched.name, "stm32f429xi");
}

#[test]
fn esp32_never_matches_any_debug_probe_target()
{
    let identity = McuIdentity::parse("ESP32 module", "", "esp32");
    assert!(fuzzy_match(&identity, &targets()).is_none());
}

#[test]
fn resolve_target_without_pack_install_returns_none_on_total_miss()
{
    let identity = McuIdentity::parse("board with COMPLETELYDIFFERENT99", "", "unknown");
    let resolved = resolve_target(&identity, &targets(), false).unwrap();
    assert!(resolved.is_none());
}

#[test]
fn resolve_target_finds_an_existing_match_without_touching_packs()
{
    let identity = McuIdentity::parse("Adafruit Metro M4 with SAMD51J19A", "", "samd");
    let resolved = resolve_target(&identity, &targets(), true).unwrap();
    assert_eq!(resolved.map(|t| t.name), Some("samd51j19a".to_string()));
}
