// src/pipeline.rs
use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::{
    config::Config,
    database::{aggregate, emit, EmitReport},
    fetch,
    ingest::{
        columns::{resolve, PlannedColumns},
        loader::{load, LoaderOptions},
        RawTable,
    },
};

/// One full batch run: fetch the installed export, load both tables, fold
/// them, and write the shards.
///
/// The installed table is required: a failed download without a local copy,
/// an unreadable file, or a missing city/street/house column aborts the run.
/// The planned table is optional and is skipped with a warning when it is
/// missing, unreadable, or lacks any of its four columns.
pub fn run(cfg: &Config) -> Result<EmitReport> {
    let loader = cfg.loader_options()?;

    // ─── 1) make sure the installed export is on disk ────────────────
    let installed_path = fetch::ensure_source(cfg)?;

    // ─── 2) installed meters (required) ──────────────────────────────
    info!("processing installed meters");
    let installed = load(&installed_path, &loader)
        .with_context(|| format!("loading installed meters {}", installed_path.display()))?;
    let installed_cols = resolve(&installed.headers, &cfg.keywords)
        .installed()
        .context("resolving installed meter columns")?;

    // ─── 3) planned meters (optional) ────────────────────────────────
    info!("processing planned meters");
    let planned = load_planned(cfg, &loader);

    // ─── 4) aggregate + emit ─────────────────────────────────────────
    let (db, stats) = aggregate(
        (&installed, &installed_cols),
        planned.as_ref().map(|(t, c)| (t, c)),
    );
    info!(
        installed_skipped = installed.skipped_rows,
        planned_skipped = planned.as_ref().map_or(0, |(t, _)| t.skipped_rows),
        dropped_empty = stats.installed_dropped + stats.planned_dropped,
        "row summary"
    );

    let report = emit(&db, &cfg.output_dir)?;
    if !report.dropped.is_empty() {
        warn!(
            "{} cities had no usable file name: {:?}",
            report.dropped.len(),
            report.dropped
        );
    }
    if !report.overwritten.is_empty() {
        warn!(
            "{} cities lost their shard to a same-named city: {:?}",
            report.overwritten.len(),
            report.overwritten
        );
    }
    Ok(report)
}

fn load_planned(cfg: &Config, loader: &LoaderOptions) -> Option<(RawTable, PlannedColumns)> {
    let table = match load(&cfg.planned_file, loader) {
        Ok(table) => table,
        Err(e) => {
            warn!("skipping planned meters: {}", e);
            return None;
        }
    };
    match resolve(&table.headers, &cfg.keywords).planned() {
        Ok(cols) => Some((table, cols)),
        Err(e) => {
            warn!("skipping planned meters: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::emit::CITIES_INDEX;
    use std::{fs, path::Path};
    use tempfile::tempdir;

    fn config_in(dir: &Path, installed: &str, planned: Option<&str>) -> Result<Config> {
        let installed_file = dir.join("installed.csv");
        fs::write(&installed_file, installed)?;
        let planned_file = dir.join("planned.csv");
        if let Some(text) = planned {
            fs::write(&planned_file, text)?;
        }
        Ok(Config {
            installed_file,
            planned_file,
            output_dir: dir.join("data"),
            ..Config::default()
        })
    }

    fn read_index(cfg: &Config) -> Result<Vec<String>> {
        let text = fs::read_to_string(cfg.output_dir.join(CITIES_INDEX))?;
        Ok(serde_json::from_str(&text)?)
    }

    #[test]
    fn installed_and_planned_are_merged() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config_in(
            tmp.path(),
            "עיר,רחוב,מספר בית\nתל אביב,הרצל,8.0\n",
            Some("עיר;רחוב;בית;רבעון\nתל אביב;הרצל;12;Q1\nתל אביב;הרצל;12;Q3\n"),
        )?;

        let report = run(&cfg)?;
        assert_eq!(report.cities_written, 1);
        assert_eq!(read_index(&cfg)?, vec!["תל אביב"]);
        let shard = fs::read_to_string(cfg.output_dir.join("תל אביב.json"))?;
        assert_eq!(shard, r#"{"הרצל":{"i":["8"],"p":{"12":"Q3"}}}"#);
        Ok(())
    }

    #[test]
    fn planned_without_quarter_column_is_skipped() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config_in(
            tmp.path(),
            "City,Street,House\nHaifa,Main,1\n",
            Some("City,Street,House\nHaifa,Main,2\n"),
        )?;

        let report = run(&cfg)?;
        assert_eq!(report.cities_written, 1);
        let shard = fs::read_to_string(cfg.output_dir.join("Haifa.json"))?;
        assert_eq!(shard, r#"{"Main":{"i":["1"],"p":{}}}"#);
        Ok(())
    }

    #[test]
    fn missing_planned_file_is_skipped() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config_in(tmp.path(), "City,Street,House\nHaifa,Main,1\n", None)?;

        let report = run(&cfg)?;
        assert_eq!(report.cities_written, 1);
        assert_eq!(read_index(&cfg)?, vec!["Haifa"]);
        Ok(())
    }

    #[test]
    fn unreadable_planned_file_is_skipped() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config_in(
            tmp.path(),
            "City,Street,House\nHaifa,Main,1\n",
            Some("no header anywhere\n"),
        )?;

        assert_eq!(run(&cfg)?.cities_written, 1);
        Ok(())
    }

    #[test]
    fn installed_without_street_column_is_fatal() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config_in(tmp.path(), "City,Neighbourhood,House\nHaifa,Carmel,1\n", None)?;

        let err = run(&cfg).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("street"), "{msg}");
        assert!(msg.contains("Neighbourhood"), "{msg}");
        assert!(!cfg.output_dir.exists());
        Ok(())
    }

    #[test]
    fn installed_without_header_is_fatal() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config_in(tmp.path(), "just,some,numbers\n1,2,3\n", None)?;

        let msg = format!("{:#}", run(&cfg).unwrap_err());
        assert!(msg.contains("no encoding produced a table"), "{msg}");
        Ok(())
    }
}
