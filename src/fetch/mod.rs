// src/fetch/mod.rs
use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::Config;

pub mod download;

pub use download::download;

/// Blocking client for the meter export endpoint.
pub fn build_client(cfg: &Config) -> Result<Client> {
    if cfg.insecure_tls {
        warn!("TLS certificate verification is disabled for the source download");
    }
    Client::builder()
        .timeout(cfg.download_timeout())
        .danger_accept_invalid_certs(cfg.insecure_tls)
        .build()
        .context("building HTTP client")
}

/// Make sure the installed-meters file is on disk and return its path.
///
/// With a `source_url` the file is (re)downloaded first; if that fails an
/// existing local copy is used instead. Without a local copy the run cannot
/// continue.
pub fn ensure_source(cfg: &Config) -> Result<PathBuf> {
    let dest = cfg.installed_file.clone();
    let Some(url) = cfg.source_url.as_deref() else {
        info!(path = %dest.display(), "no source_url configured, using local file");
        return local_only(dest);
    };

    let client = build_client(cfg)?;
    match download(&client, url, &dest) {
        Ok(bytes) => {
            info!(bytes, path = %dest.display(), "download complete");
            Ok(dest)
        }
        Err(e) => {
            warn!("download of {} failed: {:#}", url, e);
            if dest.is_file() {
                warn!(path = %dest.display(), "falling back to existing local copy");
                Ok(dest)
            } else {
                Err(e).with_context(|| {
                    format!("download failed and no local copy at {}", dest.display())
                })
            }
        }
    }
}

fn local_only(dest: PathBuf) -> Result<PathBuf> {
    if !dest.is_file() {
        bail!("installed meters file {} does not exist", dest.display());
    }
    Ok(dest)
}
