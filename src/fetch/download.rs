use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::{
    fs,
    io::{Read, Write},
    path::Path,
};
use tempfile::NamedTempFile;
use tracing::info;
use url::Url;

const CHUNK: usize = 64 * 1024;
/// Progress cadence when the server sends no Content-Length.
const UNKNOWN_LEN_STEP: u64 = 1024 * 1024;

/// Download `url` to `dest`, returning the number of bytes written.
///
/// The body is streamed into a temp file next to `dest` and only moved over
/// `dest` once complete, so a failed transfer leaves any previous copy intact.
pub fn download(client: &Client, url: &str, dest: impl AsRef<Path>) -> Result<u64> {
    let dest = dest.as_ref();
    let url = Url::parse(url).with_context(|| format!("parsing URL {}", url))?;

    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    info!(url = %url, "downloading");
    let mut resp = client
        .get(url.as_str())
        .send()
        .with_context(|| format!("GET {}", url))?
        .error_for_status()?;
    let total = resp.content_length();

    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    let mut buf = vec![0u8; CHUNK];
    let mut written: u64 = 0;
    let mut next_report = step(total);

    loop {
        let n = resp
            .read(&mut buf)
            .with_context(|| format!("reading body from {}", url))?;
        if n == 0 {
            break;
        }
        tmp.write_all(&buf[..n])?;
        written += n as u64;

        if written >= next_report {
            match total {
                Some(t) if t > 0 => {
                    info!("downloaded {}% ({}/{} bytes)", written * 100 / t, written, t)
                }
                _ => info!("downloaded {} bytes", written),
            }
            next_report = written + step(total);
        }
    }

    tmp.flush()?;
    tmp.persist(dest)
        .with_context(|| format!("moving download into {}", dest.display()))?;
    Ok(written)
}

/// Report roughly every 10% of a known length.
fn step(total: Option<u64>) -> u64 {
    match total {
        Some(t) if t > 0 => (t / 10).max(1),
        _ => UNKNOWN_LEN_STEP,
    }
}
