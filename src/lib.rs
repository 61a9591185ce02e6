// SPDX-License-Identifier: MIT OR Apache-2.0

pub mod bootloader;
pub mod catalog;
pub mod config;
pub mod device;
pub mod enumerator;
pub mod error;
pub mod firmware_download;
pub mod interactive;
pub mod introspect;
pub mod orchestrator;
pub mod target_resolution;
pub mod transport;
pub mod usb;
pub mod worklist;
