pub mod config;
pub mod database;
pub mod fetch;
pub mod ingest;
pub mod pipeline;

pub use config::Config;
pub use database::{aggregate, AggregateStats, CityDatabase, EmitReport, StreetRecord};
pub use ingest::{
    columns::{resolve, Role, SemanticColumnMap},
    loader::{load, LoaderOptions},
    normalize::normalize,
    RawTable,
};
pub use pipeline::run;
