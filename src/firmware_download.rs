// SPDX-License-Identifier: MIT OR Apache-2.0
//! Firmware downloading (§2.1 ambient stack): fetches the release index and
//! firmware archives over HTTP, with ETag caching computed from the
//! previously cached file's SHA-256 digest.

use std::fs;
use std::io::Read;
use std::path::Path;

use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::IF_NONE_MATCH;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Download `url` into `destination`, skipping the transfer (returning
/// `false`) if the cached copy's digest matches the server's current ETag.
///
/// Mirrors the teacher's metadata-caching approach exactly (`metadata/mod.rs`'s
/// `compute_etag`): there is no persisted ETag sidecar, the cached file's own
/// SHA-256 digest is recomputed and sent as the `If-None-Match` value on
/// every request.
pub fn download_cached(client: &Client, url: &str, destination: &Path) -> Result<bool>
{
    let mut request = client.get(url);
    if let Some(etag) = cached_etag(destination)? {
        request = request.header(IF_NONE_MATCH, etag);
    }

    let response = request.send()?;
    if response.status() == reqwest::StatusCode::NOT_MODIFIED {
        debug!("{} is unchanged, skipping download", url);
        return Ok(false);
    }

    let response = response.error_for_status()?;
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = response.bytes()?;
    fs::write(destination, &bytes)?;

    info!("downloaded {} ({} bytes)", url, bytes.len());
    Ok(true)
}

/// Unpack a zip archive previously fetched by [download_cached] into `target_dir`.
pub fn unpack_archive(archive: &Path, target_dir: &Path) -> Result<()>
{
    fs::create_dir_all(target_dir)?;
    let file = fs::File::open(archive)?;
    let reader = rc_zip_sync::ReadZip::read_zip(file).map_err(|e| crate::error::ErrorKind::TransportFailed(e.to_string()).error())?;

    for entry in reader.entries() {
        let out_path = target_dir.join(entry.name());
        if entry.name().ends_with('/') {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut contents = Vec::new();
        entry.reader().read_to_end(&mut contents)?;
        fs::write(out_path, contents)?;
    }

    Ok(())
}

fn cached_etag(destination: &Path) -> Result<Option<String>>
{
    if !destination.exists() {
        return Ok(None);
    }

    let mut hasher = Sha256::new();
    let mut file = fs::File::open(destination)?;
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    let digest = hasher.finalize();

    let mut etag = String::with_capacity(digest.len() * 2 + 2);
    etag.push('"');
    for byte in digest {
        etag.push_str(&format!("{:02x}", byte));
    }
    etag.push('"');
    Ok(Some(etag))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn cached_etag_is_none_without_a_cached_file()
    {
        let dir = std::env::temp_dir().join(format!("mpflash-dl-test-missing-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let destination = dir.join("index.json");

        assert_eq!(cached_etag(&destination).unwrap(), None);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn cached_etag_is_the_quoted_hex_digest_of_the_cached_file()
    {
        let dir = std::env::temp_dir().join(format!("mpflash-dl-test-present-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let destination = dir.join("index.json");
        fs::write(&destination, b"{}").unwrap();

        let digest = Sha256::digest(b"{}");
        let mut expected = String::from("\"");
        for byte in digest {
            expected.push_str(&format!("{:02x}", byte));
        }
        expected.push('"');
        assert_eq!(cached_etag(&destination).unwrap(), Some(expected));
        fs::remove_dir_all(&dir).ok();
    }
}
