use anyhow::{bail, Context, Result};
use encoding_rs::Encoding;
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf, time::Duration};
use url::Url;

use crate::ingest::{columns::RoleKeywords, loader::LoaderOptions};

/// Everything a run needs. Every field has a default, so an empty (or absent)
/// YAML file is a valid configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the installed-meters export is published. Without it the run
    /// uses `installed_file` as-is.
    pub source_url: Option<String>,
    /// Accept invalid TLS certificates from `source_url`.
    pub insecure_tls: bool,
    pub download_timeout_secs: u64,

    pub installed_file: PathBuf,
    pub planned_file: PathBuf,
    pub output_dir: PathBuf,

    /// How many leading lines are searched for the header row.
    pub header_scan_lines: usize,
    /// WHATWG encoding labels, tried in order.
    pub encodings: Vec<String>,
    /// Words that mark a line as the header row.
    pub header_signals: Vec<String>,
    pub keywords: RoleKeywords,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: None,
            insecure_tls: true,
            download_timeout_secs: 300,
            installed_file: PathBuf::from("iec_sources/installed_meters.csv"),
            planned_file: PathBuf::from("iec_sources/annual_plan_26.csv"),
            output_dir: PathBuf::from("data"),
            header_scan_lines: 15,
            encodings: ["utf-8", "windows-1255", "iso-8859-8", "windows-1252"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            header_signals: ["עיר", "רחוב", "City", "Street"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            keywords: RoleKeywords::default(),
        }
    }
}

impl Config {
    /// Load from a YAML file, or fall back to defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                Self::from_yaml(&text).with_context(|| format!("parsing config {}", p.display()))?
            }
            None => Self::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        // an empty document deserializes to unit, not to a map
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.source_url {
            Url::parse(url).with_context(|| format!("invalid source_url {:?}", url))?;
        }
        if self.header_scan_lines == 0 {
            bail!("header_scan_lines must be at least 1");
        }
        if self.header_signals.iter().all(|s| s.is_empty()) {
            bail!("header_signals must contain at least one non-empty word");
        }
        if self.encodings.is_empty() {
            bail!("encodings must list at least one candidate");
        }
        self.encoding_candidates()?;
        self.keywords.validate()?;
        Ok(())
    }

    /// Resolve the configured labels to `encoding_rs` encodings, preserving order.
    pub fn encoding_candidates(&self) -> Result<Vec<&'static Encoding>> {
        self.encodings
            .iter()
            .map(|label| {
                Encoding::for_label(label.trim().as_bytes())
                    .with_context(|| format!("unknown encoding label {:?}", label))
            })
            .collect()
    }

    pub fn loader_options(&self) -> Result<LoaderOptions> {
        Ok(LoaderOptions {
            encodings: self.encoding_candidates()?,
            scan_lines: self.header_scan_lines,
            header_signals: self
                .header_signals
                .iter()
                .filter(|s| !s.is_empty())
                .cloned()
                .collect(),
        })
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}
