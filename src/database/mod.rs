// src/database/mod.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::ingest::{
    columns::{InstalledColumns, PlannedColumns},
    normalize::normalize_cell,
    RawTable,
};

pub mod emit;

pub use emit::{emit, sanitize_file_stem, EmitReport};

/// Meters of one street.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreetRecord {
    /// House numbers with an installed meter, in file order, duplicates kept.
    #[serde(rename = "i")]
    pub installed: Vec<String>,
    /// House number → planned quarter. Later rows overwrite earlier ones.
    #[serde(rename = "p")]
    pub planned: BTreeMap<String, String>,
}

pub type StreetMap = BTreeMap<String, StreetRecord>;

/// City → street → meters. City and street keys are never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CityDatabase {
    cities: BTreeMap<String, StreetMap>,
}

/// Row counts from one aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub installed_rows: usize,
    pub installed_dropped: usize,
    pub planned_rows: usize,
    pub planned_dropped: usize,
}

impl CityDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// City keys in sorted order.
    pub fn city_names(&self) -> impl Iterator<Item = &str> {
        self.cities.keys().map(String::as_str)
    }

    pub fn streets(&self, city: &str) -> Option<&StreetMap> {
        self.cities.get(city)
    }

    pub fn street(&self, city: &str, street: &str) -> Option<&StreetRecord> {
        self.cities.get(city)?.get(street)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StreetMap)> {
        self.cities.iter()
    }

    /// Create-on-first-access. `None` when either key is empty.
    fn entry(&mut self, city: String, street: String) -> Option<&mut StreetRecord> {
        if city.is_empty() || street.is_empty() {
            return None;
        }
        Some(
            self.cities
                .entry(city)
                .or_default()
                .entry(street)
                .or_default(),
        )
    }

    /// Append every installed row's house number to its street.
    /// Returns `(folded, dropped)`.
    pub fn ingest_installed(&mut self, table: &RawTable, cols: &InstalledColumns) -> (usize, usize) {
        let (mut folded, mut dropped) = (0, 0);
        for row in &table.rows {
            let cell = |i: usize| normalize_cell(row.get(i).map(String::as_str));
            let house = cell(cols.house_number);
            match self.entry(cell(cols.city), cell(cols.street)) {
                Some(record) => {
                    record.installed.push(house);
                    folded += 1;
                }
                None => dropped += 1,
            }
        }
        debug!(folded, dropped, "installed rows folded");
        (folded, dropped)
    }

    /// Record every planned row's quarter under its house number.
    /// Returns `(folded, dropped)`.
    pub fn ingest_planned(&mut self, table: &RawTable, cols: &PlannedColumns) -> (usize, usize) {
        let (mut folded, mut dropped) = (0, 0);
        for row in &table.rows {
            let cell = |i: usize| normalize_cell(row.get(i).map(String::as_str));
            let house = cell(cols.house_number);
            let quarter = cell(cols.quarter);
            match self.entry(cell(cols.city), cell(cols.street)) {
                Some(record) => {
                    record.planned.insert(house, quarter);
                    folded += 1;
                }
                None => dropped += 1,
            }
        }
        debug!(folded, dropped, "planned rows folded");
        (folded, dropped)
    }
}

/// Fold the installed table, then the planned one when present, into a fresh
/// database.
pub fn aggregate(
    installed: (&RawTable, &InstalledColumns),
    planned: Option<(&RawTable, &PlannedColumns)>,
) -> (CityDatabase, AggregateStats) {
    let mut db = CityDatabase::new();
    let mut stats = AggregateStats::default();

    (stats.installed_rows, stats.installed_dropped) = db.ingest_installed(installed.0, installed.1);
    if let Some((table, cols)) = planned {
        (stats.planned_rows, stats.planned_dropped) = db.ingest_planned(table, cols);
    }

    info!(
        cities = db.len(),
        installed = stats.installed_rows,
        planned = stats.planned_rows,
        dropped = stats.installed_dropped + stats.planned_dropped,
        "aggregated"
    );
    (db, stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
            encoding: "UTF-8",
            delimiter: b',',
            header_row: 0,
            skipped_rows: 0,
        }
    }

    const INSTALLED: InstalledColumns = InstalledColumns {
        city: 0,
        street: 1,
        house_number: 2,
    };
    const PLANNED: PlannedColumns = PlannedColumns {
        city: 0,
        street: 1,
        house_number: 2,
        quarter: 3,
    };

    #[test]
    fn float_house_number_is_normalized() {
        let installed = table(&["עיר", "רחוב", "בית"], &[&["תל אביב", "הרצל", "8.0"]]);
        let (db, stats) = aggregate((&installed, &INSTALLED), None);

        let rec = db.street("תל אביב", "הרצל").unwrap();
        assert_eq!(rec.installed, vec!["8"]);
        assert!(rec.planned.is_empty());
        assert_eq!(stats.installed_rows, 1);
    }

    #[test]
    fn installed_keeps_order_and_duplicates() {
        let installed = table(
            &["עיר", "רחוב", "בית"],
            &[
                &["חיפה", "הנמל", "5"],
                &["חיפה", "הנמל", "3"],
                &["חיפה", "הנמל", "5.0"],
                &["חיפה", "הנמל", "1"],
            ],
        );
        let (db, _) = aggregate((&installed, &INSTALLED), None);
        assert_eq!(db.street("חיפה", "הנמל").unwrap().installed, vec!["5", "3", "5", "1"]);
    }

    #[test]
    fn planned_last_row_wins() {
        let installed = table(&["עיר", "רחוב", "בית"], &[]);
        let planned = table(
            &["עיר", "רחוב", "בית", "רבעון"],
            &[
                &["תל אביב", "הרצל", "12", "Q1"],
                &["תל אביב", "הרצל", "14", "Q2"],
                &["תל אביב", "הרצל", "12.0", "Q3"],
            ],
        );
        let (db, stats) = aggregate((&installed, &INSTALLED), Some((&planned, &PLANNED)));

        let rec = db.street("תל אביב", "הרצל").unwrap();
        assert_eq!(rec.planned.get("12").map(String::as_str), Some("Q3"));
        assert_eq!(rec.planned.get("14").map(String::as_str), Some("Q2"));
        assert!(rec.installed.is_empty());
        assert_eq!(stats.planned_rows, 3);
    }

    #[test]
    fn empty_city_or_street_contributes_nothing() {
        let rows: &[&[&str]] = &[
            &["חיפה", "הנמל", "1"],
            &["", "הנמל", "2"],
            &["nan", "הנמל", "3"],
            &["חיפה", "  ", "4"],
            &["חיפה", "הנמל", "5"],
        ];
        let installed = table(&["עיר", "רחוב", "בית"], rows);
        let planned = table(
            &["עיר", "רחוב", "בית", "רבעון"],
            &[&["", "הנמל", "1", "Q1"], &["חיפה", "הנמל", "1", "Q2"]],
        );
        let (db, stats) = aggregate((&installed, &INSTALLED), Some((&planned, &PLANNED)));

        assert_eq!(db.len(), 1);
        assert_eq!(db.streets("חיפה").unwrap().len(), 1);
        let rec = db.street("חיפה", "הנמל").unwrap();
        assert_eq!(rec.installed, vec!["1", "5"]);
        assert_eq!(rec.planned.get("1").map(String::as_str), Some("Q2"));
        assert_eq!(stats.installed_dropped, 3);
        assert_eq!(stats.planned_dropped, 1);
        assert!(db.city_names().all(|c| !c.is_empty()));
    }

    #[test]
    fn city_keys_are_exact_after_trim() {
        let installed = table(
            &["עיר", "רחוב", "בית"],
            &[
                &[" Haifa ", "Main", "1"],
                &["Haifa", "Main", "2"],
                &["haifa", "Main", "3"],
            ],
        );
        let (db, _) = aggregate((&installed, &INSTALLED), None);
        assert_eq!(db.city_names().collect::<Vec<_>>(), vec!["Haifa", "haifa"]);
        assert_eq!(db.street("Haifa", "Main").unwrap().installed, vec!["1", "2"]);
    }

    #[test]
    fn street_record_uses_compact_keys() -> anyhow::Result<()> {
        let mut rec = StreetRecord::default();
        rec.installed.push("8".into());
        rec.planned.insert("12".into(), "Q3".into());
        assert_eq!(serde_json::to_string(&rec)?, r#"{"i":["8"],"p":{"12":"Q3"}}"#);
        Ok(())
    }
}
