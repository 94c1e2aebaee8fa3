use reqwest::Client;
use std::{
    fs::{self, File},
    io::{self, Cursor},
    path::{Path, PathBuf},
};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::FetchError;

/// GET `url` and return the whole response body.
pub async fn download_zip(client: &Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let resp = client.get(url).send().await?.error_for_status()?;
    let bytes = resp.bytes().await?;
    debug!(url, size = bytes.len(), "downloaded archive");
    Ok(bytes.to_vec())
}

/// Unpack every `*.csv` entry of an in-memory archive under `dest_dir`,
/// keeping the entry's relative path. Other entries are ignored.
/// Returns the written paths in archive order.
///
/// Blocking file I/O; the archive is already in memory and small.
pub fn extract_csv_entries(bytes: &[u8], dest_dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut written = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !entry.is_file() || !entry.name().ends_with(".csv") {
            continue;
        }

        let Some(relative) = entry.enclosed_name() else {
            warn!(name = entry.name(), "skipping entry with unsafe path");
            continue;
        };
        let dest_path = dest_dir.join(relative);

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).map_err(|source| FetchError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut out = File::create(&dest_path).map_err(|source| FetchError::Io {
            path: dest_path.clone(),
            source,
        })?;
        io::copy(&mut entry, &mut out).map_err(|source| FetchError::Io {
            path: dest_path.clone(),
            source,
        })?;

        debug!(path = %dest_path.display(), "extracted");
        written.push(dest_path);
    }

    Ok(written)
}
