use anyhow::Result;
use meterdb::{pipeline, Config};
use std::{env, path::PathBuf, time::Instant};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,meterdb=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    let start = Instant::now();

    // ─── 2) config ───────────────────────────────────────────────────
    let cfg_path = env::args_os().nth(1).map(PathBuf::from);
    let cfg = Config::load(cfg_path.as_deref())?;

    // ─── 3) fetch, load, aggregate, emit ─────────────────────────────
    let report = pipeline::run(&cfg)?;

    info!(
        "created {} city files in {} ({:?})",
        report.cities_written,
        cfg.output_dir.display(),
        start.elapsed()
    );
    Ok(())
}
