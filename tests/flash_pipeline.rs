// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cross-module tests of the worklist -> transport-selection pipeline, using
//! an in-memory catalog and synthetic devices so no serial hardware is needed.

use mpflash::catalog::{Board, Catalog, Firmware};
use mpflash::device::{Device, Family};
use mpflash::introspect;
use mpflash::transport::{self, Transport, TransportRequest};
use mpflash::worklist::{self, TransportHint};

fn board(board_id: &str, port: &str, version: &str) -> Board
{
    Board {
        board_id: board_id.to_string(),
        version: version.to_string(),
        board_name: board_id.to_string(),
        mcu: String::new(),
        variant: String::new(),
        port: port.to_string(),
        path: String::new(),
        description: String::new(),
        family: "micropython".to_string(),
        custom: false,
    }
}

fn firmware(board_id: &str, port: &str, version: &str, file: &str) -> Firmware
{
    Firmware {
        id: 0,
        board_id: board_id.to_string(),
        version: version.to_string(),
        port: port.to_string(),
        description: String::new(),
        firmware_file: file.to_string(),
        source: String::new(),
        build: 0,
        custom: false,
    }
}

/// A device that has been introspected as a running MicroPython board on `port`.
fn introspected_device(serial: &str, port: &str, board_id: &str) -> Device
{
    let mut device = Device::new(serial);
    device.family = Family::MicroPython;
    device.port = port.to_string();
    device.board_id = board_id.to_string();
    device.version = "1.22.0".to_string();
    device
}

#[test]
fn rp2_device_resolves_uf2_firmware_and_selects_uf2_transport()
{
    let catalog = Catalog::open_in_memory().unwrap();
    catalog
        .upsert_firmware(
            &board("RPI_PICO", "rp2", "1.22.0"),
            &firmware("RPI_PICO", "rp2", "1.22.0", "rp2/RPI_PICO-1.22.0.uf2"),
        )
        .unwrap();

    let device = introspected_device("/dev/ttyACM0", "rp2", "RPI_PICO");
    let items = worklist::auto_update_worklist(&catalog, vec![device], "1.22.0", TransportHint::Uf2).unwrap();

    assert_eq!(items.len(), 1);
    let firmware = items[0].firmware.as_ref().expect("firmware should resolve");
    assert_eq!(firmware.firmware_file, "rp2/RPI_PICO-1.22.0.uf2");

    let artifact = std::path::Path::new(&firmware.firmware_file);
    let transport = transport::select(&items[0].device, artifact, TransportRequest::Auto).unwrap();
    assert_eq!(transport, Transport::Uf2);
}

#[test]
fn pico_device_resolves_firmware_catalogued_under_rpi_pico_via_rewrite()
{
    let catalog = Catalog::open_in_memory().unwrap();
    catalog
        .upsert_firmware(
            &board("RPI_PICO", "rp2", "1.22.0"),
            &firmware("RPI_PICO", "rp2", "1.22.0", "rp2/RPI_PICO-1.22.0.uf2"),
        )
        .unwrap();

    // The device reports the bare "PICO" id; only the catalog's rewrite retry finds it.
    let device = introspected_device("/dev/ttyACM1", "rp2", "PICO");
    let items = worklist::auto_update_worklist(&catalog, vec![device], "1.22.0", TransportHint::Uf2).unwrap();

    assert_eq!(items.len(), 1);
    let firmware = items[0].firmware.as_ref().expect("firmware should resolve via rewrite");
    assert_eq!(firmware.firmware_file, "rp2/RPI_PICO-1.22.0.uf2");
}

#[test]
fn unresolvable_firmware_yields_worklist_item_with_no_artifact()
{
    let catalog = Catalog::open_in_memory().unwrap();
    let device = introspected_device("/dev/ttyACM2", "esp32", "UNKNOWN_BOARD");

    let items = worklist::auto_update_worklist(&catalog, vec![device], "1.22.0", TransportHint::Auto).unwrap();

    assert_eq!(items.len(), 1);
    assert!(items[0].firmware.is_none());
}

#[test]
fn preview_version_selects_highest_build_and_programs_via_esptool()
{
    let catalog = Catalog::open_in_memory().unwrap();
    catalog
        .upsert_firmware(
            &board("ESP32_GENERIC", "esp32", "preview"),
            &firmware("ESP32_GENERIC", "esp32", "preview", "esp32/preview/ESP32_GENERIC-100.bin"),
        )
        .unwrap();
    catalog
        .upsert_firmware(
            &board("ESP32_GENERIC", "esp32", "preview"),
            &firmware("ESP32_GENERIC", "esp32", "preview", "esp32/preview/ESP32_GENERIC-200.bin"),
        )
        .unwrap();

    let device = introspected_device("/dev/ttyUSB0", "esp32", "ESP32_GENERIC");
    let items = worklist::auto_update_worklist(&catalog, vec![device], "preview", TransportHint::EspTool).unwrap();

    assert_eq!(items.len(), 1);
    let firmware = items[0].firmware.as_ref().unwrap();
    assert_eq!(firmware.firmware_file, "esp32/preview/ESP32_GENERIC-200.bin");

    let artifact = std::path::Path::new(&firmware.firmware_file);
    let transport = transport::select(&items[0].device, artifact, TransportRequest::Auto).unwrap();
    assert_eq!(transport, Transport::EspTool);
}

#[test]
fn circuitpython_device_is_excluded_from_the_worklist_entirely()
{
    let catalog = Catalog::open_in_memory().unwrap();
    let mut device = Device::new("/dev/ttyACM3");
    device.family = Family::Other("circuitpython".to_string());

    let items = worklist::auto_update_worklist(&catalog, vec![device], "1.22.0", TransportHint::Auto).unwrap();
    assert!(items.is_empty());
}

#[test]
fn real_introspection_record_resolves_board_id_via_description_lookup()
{
    // Exercises the actual on-device record parser, not a hand-built Device
    // fixture, so that a board-id resolution regression would be caught here.
    let record = "{'family': 'micropython', 'version': '1.22.0', 'build': '', 'port': 'stm32', \
                   'board': 'NUCLEO-WB55 with STM32WB55RGV6', 'cpu': '', 'arch': 'armv7emsp'}";
    let device = introspect::parse_record("/dev/ttyACM4", record);
    assert!(device.board_id.is_empty(), "parse_record should not itself assign a board id");

    let catalog = Catalog::open_in_memory().unwrap();
    let nucleo_wb55 = Board {
        board_id: "NUCLEO_WB55".to_string(),
        version: "1.22.0".to_string(),
        board_name: "NUCLEO-WB55".to_string(),
        mcu: "STM32WB55RGV6".to_string(),
        variant: String::new(),
        port: "stm32".to_string(),
        path: String::new(),
        description: "NUCLEO-WB55 with STM32WB55RGV6".to_string(),
        family: "micropython".to_string(),
        custom: false,
    };
    catalog
        .upsert_firmware(&nucleo_wb55, &firmware("NUCLEO_WB55", "stm32", "1.22.0", "stm32/NUCLEO_WB55-1.22.0.dfu"))
        .unwrap();

    let items = worklist::auto_update_worklist(&catalog, vec![device], "1.22.0", TransportHint::Dfu).unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].device.board_id, "NUCLEO_WB55");
    let firmware = items[0].firmware.as_ref().expect("firmware should resolve once the board id is looked up");
    assert_eq!(firmware.firmware_file, "stm32/NUCLEO_WB55-1.22.0.dfu");
}

#[test]
fn explicit_method_override_is_rejected_when_unsuitable_for_the_artifact()
{
    let catalog = Catalog::open_in_memory().unwrap();
    catalog
        .upsert_firmware(
            &board("RPI_PICO", "rp2", "1.22.0"),
            &firmware("RPI_PICO", "rp2", "1.22.0", "rp2/RPI_PICO-1.22.0.uf2"),
        )
        .unwrap();

    let device = introspected_device("/dev/ttyACM0", "rp2", "RPI_PICO");
    let items = worklist::auto_update_worklist(&catalog, vec![device], "1.22.0", TransportHint::Uf2).unwrap();
    let firmware = items[0].firmware.as_ref().unwrap();
    let artifact = std::path::Path::new(&firmware.firmware_file);

    // A UF2 artifact cannot be pushed over DFU.
    let result = transport::select(&items[0].device, artifact, TransportRequest::Dfu);
    assert!(result.is_err());
}
