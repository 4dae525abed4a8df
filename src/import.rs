//! CSV import of postal codes
//!
//! Input is `postal_code,place_name,county_name` per record after a header
//! record; quoted fields may hold commas and line breaks. Each row is resolved like a `POST /postal-codes` body. Rows with
//! fewer than three non-empty fields are skipped and reported.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use crate::{Error, Result};
use crate::query::Resolver;
use crate::storage::SqliteStore;

/// Counters reported after an import
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ImportStats {
    pub rows: usize,
    pub postal_codes: usize,
    pub counties_created: usize,
    pub places_created: usize,
    pub skipped: usize,
}

/// Import a CSV file; see [`import_csv`]
pub fn import_file(store: &SqliteStore, path: &Path, on_row: impl FnMut(&ImportStats)) -> Result<ImportStats> {
    let file = File::open(path)
        .map_err(|e| Error::Import(format!("cannot open {}: {}", path.display(), e)))?;
    import_csv(store, file, on_row)
}

/// Import all rows in one transaction. `on_row` sees the running totals.
pub fn import_csv<R: Read>(store: &SqliteStore, reader: R, mut on_row: impl FnMut(&ImportStats)) -> Result<ImportStats> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut stats = ImportStats::default();
    let resolver = Resolver::new(store);
    let tx = store.transaction()?;

    for record in reader.records() {
        let record = record?;
        stats.rows += 1;

        let fields = (record.get(0), record.get(1), record.get(2));
        let (postal_code, place_name, county_name) = match fields {
            (Some(a), Some(b), Some(c)) if !a.is_empty() && !b.is_empty() && !c.is_empty() => (a, b, c),
            _ => {
                let line = record.position().map_or(0, |p| p.line());
                tracing::warn!(line, "skipping malformed row: {:?}", record);
                stats.skipped += 1;
                continue;
            }
        };

        let resolution = resolver.resolve(county_name, place_name)?;
        store.insert_postal_code(postal_code, resolution.place_id())?;
        stats.postal_codes += 1;
        stats.counties_created += usize::from(resolution.created_county);
        stats.places_created += usize::from(resolution.created_place);
        on_row(&stats);
    }

    tx.commit()?;
    tracing::info!(
        rows = stats.rows,
        postal_codes = stats.postal_codes,
        skipped = stats.skipped,
        "import finished"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const SAMPLE: &str = "postal_code,place_name,county_name
1011,Budapest,Budapest
1012,Budapest,Budapest
2000,Szentendre,Pest
2030,\"Érd, város\",Pest
broken-row
";

    #[test]
    fn test_import_resolves_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut seen = 0;
        let stats = import_csv(&store, Cursor::new(SAMPLE), |_| seen += 1).unwrap();

        assert_eq!(
            stats,
            ImportStats { rows: 5, postal_codes: 4, counties_created: 2, places_created: 3, skipped: 1 }
        );
        assert_eq!(seen, 4);
        assert_eq!(store.count_counties().unwrap(), 2);
        assert_eq!(store.count_places().unwrap(), 3);
        assert!(store.find_place("Érd, város", 2).unwrap().is_some());
    }

    #[test]
    fn test_import_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("postal_codes.csv");
        let mut file = File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let store = SqliteStore::open_in_memory().unwrap();
        let stats = import_file(&store, &path, |_| {}).unwrap();
        assert_eq!(stats.postal_codes, 4);

        let missing = import_file(&store, &dir.path().join("nope.csv"), |_| {});
        assert!(matches!(missing, Err(Error::Import(_))));
    }

    #[test]
    fn test_quoted_field_may_span_lines() {
        let store = SqliteStore::open_in_memory().unwrap();
        let csv = "postal_code,place_name,county_name\n1011,\"Buda\npest\",Budapest\n";
        let stats = import_csv(&store, Cursor::new(csv), |_| {}).unwrap();

        assert_eq!(
            stats,
            ImportStats { rows: 1, postal_codes: 1, counties_created: 1, places_created: 1, skipped: 0 }
        );
        assert!(store.find_place("Buda\npest", 1).unwrap().is_some());
    }

    #[test]
    fn test_blank_and_short_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let csv = "postal_code,place_name,county_name\n\n8200, Veszprém ,Veszprém\n8201,,Veszprém\n";
        let stats = import_csv(&store, Cursor::new(csv), |_| {}).unwrap();

        assert_eq!(stats.rows, 2);
        assert_eq!(stats.postal_codes, 1);
        assert_eq!(stats.skipped, 1);
        assert!(store.find_place("Veszprém", 1).unwrap().is_some());
    }
}
