// SPDX-License-Identifier: MIT OR Apache-2.0
//! Alternate board-identifier rewrite table (§4.4). A closed table: exactly one
//! rule fires, in the order listed, and the catalog is retried once with the
//! rewritten identifier.

/// Compute the alternate board identifier for a failed lookup, or `None` if no
/// rule in the table applies.
pub fn alternate_board_id(board_id: &str, port: &str) -> Option<String>
{
    if let Some(rest) = board_id.strip_prefix("PICO") {
        return Some(format!("RPI_PICO{}", rest));
    }
    if let Some(rest) = board_id.strip_prefix("RPI_") {
        return Some(rest.to_string());
    }
    if board_id.starts_with("GENERIC") {
        return Some(format!("{}_GENERIC", port.to_uppercase()));
    }
    if let Some(rest) = board_id.strip_prefix("ESP32_") {
        return Some(rest.to_string());
    }
    if let Some(rest) = board_id.strip_prefix("ESP8266_") {
        return Some(rest.to_string());
    }
    None
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn pico_rewrites_to_rpi_pico()
    {
        assert_eq!(alternate_board_id("PICO", "rp2").as_deref(), Some("RPI_PICO"));
        assert_eq!(alternate_board_id("PICO_W", "rp2").as_deref(), Some("RPI_PICO_W"));
    }

    #[test]
    fn rpi_prefix_strips()
    {
        assert_eq!(alternate_board_id("RPI_PICO", "rp2").as_deref(), Some("PICO"));
    }

    #[test]
    fn generic_expands_with_port()
    {
        assert_eq!(alternate_board_id("GENERIC", "esp32").as_deref(), Some("ESP32_GENERIC"));
    }

    #[test]
    fn esp_prefixes_strip()
    {
        assert_eq!(alternate_board_id("ESP32_GENERIC", "esp32").as_deref(), Some("GENERIC"));
        assert_eq!(alternate_board_id("ESP8266_GENERIC", "esp8266").as_deref(), Some("GENERIC"));
    }

    #[test]
    fn unmatched_id_has_no_rewrite()
    {
        assert_eq!(alternate_board_id("NUCLEO_WB55", "stm32"), None);
    }

    #[test]
    fn only_the_first_matching_rule_fires()
    {
        // "PICO" is checked before "GENERIC"/"ESP32_" etc, so a hypothetical
        // "PICO_GENERIC" id rewrites via the PICO rule, not the GENERIC one.
        assert_eq!(alternate_board_id("PICO_GENERIC", "rp2").as_deref(), Some("RPI_PICO_GENERIC"));
    }
}
