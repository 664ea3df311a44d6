use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};
use tracing::{info, warn};

use super::CityDatabase;

/// Name of the index file listing every emitted city.
pub const CITIES_INDEX: &str = "cities.json";

/// What `emit` wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitReport {
    pub cities_written: usize,
    /// Cities whose name sanitized to nothing; they have no shard and are
    /// left out of the index.
    pub dropped: Vec<String>,
    /// Cities whose shard file was replaced by a later city with the same
    /// file name; they are left out of the index too.
    pub overwritten: Vec<String>,
}

/// File stem for a city shard: quotes removed, path separators turned into
/// `-`, surrounding whitespace trimmed. `None` if nothing is left.
pub fn sanitize_file_stem(city: &str) -> Option<String> {
    let stem = city.replace('"', "").replace(['/', '\\'], "-");
    let stem = stem.trim();
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}

/// Wipe `out_dir`, then write `cities.json` plus one `<city>.json` per city.
#[tracing::instrument(level = "info", skip(db, out_dir), fields(out = %out_dir.as_ref().display()))]
pub fn emit<P: AsRef<Path>>(db: &CityDatabase, out_dir: P) -> Result<EmitReport> {
    let out_dir = out_dir.as_ref();
    reset_dir(out_dir)?;

    let mut report = EmitReport::default();
    // stem → city that claimed it
    let mut stems: BTreeMap<String, &str> = BTreeMap::new();
    let mut index: Vec<&str> = Vec::with_capacity(db.len());

    for (city, streets) in db.iter() {
        let Some(stem) = sanitize_file_stem(city) else {
            warn!(city = %city, "city name has no usable file name, skipping shard");
            report.dropped.push(city.clone());
            continue;
        };
        if let Some(prev) = stems.insert(stem.clone(), city) {
            warn!(stem = %stem, first = %prev, second = %city, "two cities share a shard file, keeping the second");
            index.retain(|c| *c != prev);
            report.cities_written -= 1;
            report.overwritten.push(prev.to_string());
        }

        write_json(&out_dir.join(format!("{}.json", stem)), streets)?;
        index.push(city);
        report.cities_written += 1;
    }

    // BTreeMap iteration already yields cities sorted
    write_json(&out_dir.join(CITIES_INDEX), &index)?;

    info!(
        written = report.cities_written,
        dropped = report.dropped.len(),
        overwritten = report.overwritten.len(),
        "shards emitted"
    );
    Ok(report)
}

fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("removing {}", dir.display()))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))
}

/// Compact JSON, non-ASCII written as-is.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer(&mut w, value)
        .with_context(|| format!("serializing {}", path.display()))?;
    w.flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
