//! One CSV file per ticker.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::store::{CacheStats, PriceStore, StoredEntry};
use crate::errors::CacheError;
use crate::models::PriceRecord;

const EXTENSION: &str = "csv";

/// On-disk row. Prices are kept as text so decimals survive exactly.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    date: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: u64,
    change: String,
    change_percent: String,
    ticker: String,
    source: String,
}

impl CsvRow {
    fn from_record(record: &PriceRecord) -> Self {
        Self {
            date: record.date.format("%Y-%m-%d").to_string(),
            open: record.open.to_string(),
            high: record.high.to_string(),
            low: record.low.to_string(),
            close: record.close.to_string(),
            volume: record.volume,
            change: record.change.to_string(),
            change_percent: record.change_percent.to_string(),
            ticker: record.ticker.clone(),
            source: record.source.clone(),
        }
    }

    fn into_record(self, ticker: &str) -> Result<PriceRecord, CacheError> {
        let corrupt = |message: String| CacheError::Corrupt {
            ticker: ticker.to_string(),
            message,
        };
        let decimal = |field: &str, value: &str| {
            Decimal::from_str(value).map_err(|e| corrupt(format!("{} '{}': {}", field, value, e)))
        };

        Ok(PriceRecord {
            date: NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
                .map_err(|e| corrupt(format!("date '{}': {}", self.date, e)))?,
            open: decimal("open", &self.open)?,
            high: decimal("high", &self.high)?,
            low: decimal("low", &self.low)?,
            close: decimal("close", &self.close)?,
            volume: self.volume,
            change: decimal("change", &self.change)?,
            change_percent: decimal("change_percent", &self.change_percent)?,
            ticker: self.ticker,
            source: self.source,
        })
    }
}

/// Cache store writing `{TICKER}.csv` files under a directory.
///
/// The directory is created on first write. An entry's age is the file's
/// modification time.
#[derive(Clone, Debug)]
pub struct CsvFileStore {
    dir: PathBuf,
}

impl CsvFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File path for a ticker.
    ///
    /// Fails unless `{TICKER}.csv` is a single plain path component, so no
    /// ticker can point outside the cache directory.
    pub fn path_for(&self, ticker: &str) -> Result<PathBuf, CacheError> {
        let file_name = format!("{}.{}", ticker.trim().to_uppercase(), EXTENSION);
        if file_name.contains(|c: char| c == '\\' || c == '\0') {
            return Err(CacheError::InvalidTicker(ticker.to_string()));
        }

        let mut components = Path::new(&file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.dir.join(file_name)),
            _ => Err(CacheError::InvalidTicker(ticker.to_string())),
        }
    }

    fn write_rows(path: &Path, records: &[PriceRecord]) -> Result<(), CacheError> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in records {
            writer.serialize(CsvRow::from_record(record))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Cache files currently in the directory.
    fn entries(&self) -> Result<Vec<PathBuf>, CacheError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths = Vec::new();
        for entry in read_dir {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl PriceStore for CsvFileStore {
    fn load(&self, ticker: &str) -> Result<Option<StoredEntry>, CacheError> {
        let path = self.path_for(ticker)?;
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::Reader::from_path(&path)?;
        let mut records = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            records.push(row?.into_record(ticker)?);
        }

        Ok(Some(StoredEntry {
            records,
            modified: metadata.modified()?,
        }))
    }

    fn write(&self, ticker: &str, records: &[PriceRecord]) -> Result<(), CacheError> {
        let path = self.path_for(ticker)?;
        fs::create_dir_all(&self.dir)?;

        let tmp_path = path.with_extension("csv.tmp");
        if let Err(e) = Self::write_rows(&tmp_path, records).and_then(|()| {
            fs::rename(&tmp_path, &path).map_err(CacheError::from)
        }) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        debug!("Wrote {} records to {}", records.len(), path.display());
        Ok(())
    }

    fn remove(&self, ticker: &str) -> Result<bool, CacheError> {
        match fs::remove_file(self.path_for(ticker)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn remove_all(&self) -> Result<usize, CacheError> {
        let paths = self.entries()?;
        for path in &paths {
            fs::remove_file(path)?;
        }
        Ok(paths.len())
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        let paths = self.entries()?;

        let mut total_bytes = 0u64;
        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            total_bytes += fs::metadata(path)?.len();
            if let Some(stem) = path.file_stem() {
                files.push(stem.to_string_lossy().into_owned());
            }
        }

        Ok(CacheStats {
            total_files: paths.len(),
            total_size_mb: total_bytes as f64 / (1024.0 * 1024.0),
            cache_dir: self.dir.display().to_string(),
            files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn record(day: u32, close: Decimal) -> PriceRecord {
        PriceRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open: dec!(1.10),
            high: dec!(2.5),
            low: dec!(0.999),
            close,
            volume: 12_345,
            change: dec!(-0.01),
            change_percent: dec!(-1.2345),
            ticker: "MSFT".to_string(),
            source: "Alpha Vantage".to_string(),
        }
    }

    #[test]
    fn test_write_creates_directory_and_file() {
        let tmp = tempdir().unwrap();
        let store = CsvFileStore::new(tmp.path().join("nested").join("prices"));

        store.write("msft", &[record(1, dec!(400.12))]).unwrap();

        let path = store.path_for("MSFT").unwrap();
        assert!(path.ends_with("MSFT.csv"));
        assert!(path.exists());

        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with(
            "date,open,high,low,close,volume,change,change_percent,ticker,source"
        ));
    }

    #[test]
    fn test_load_preserves_exact_values() {
        let tmp = tempdir().unwrap();
        let store = CsvFileStore::new(tmp.path());
        let records = vec![record(1, dec!(400.12)), record(4, dec!(0.0001))];

        store.write("MSFT", &records).unwrap();
        let entry = store.load("MSFT").unwrap().unwrap();

        assert_eq!(entry.records, records);
    }

    #[test]
    fn test_load_missing_is_none() {
        let tmp = tempdir().unwrap();
        let store = CsvFileStore::new(tmp.path().join("absent"));
        assert!(store.load("AAPL").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_row_is_error() {
        let tmp = tempdir().unwrap();
        let store = CsvFileStore::new(tmp.path());
        fs::write(
            store.path_for("BAD").unwrap(),
            "date,open,high,low,close,volume,change,change_percent,ticker,source\n\
             2024-03-01,1,1,1,not-a-number,1,0,0,BAD,Stooq\n",
        )
        .unwrap();

        let err = store.load("BAD").unwrap_err();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[test]
    fn test_remove_and_stats() {
        let tmp = tempdir().unwrap();
        let store = CsvFileStore::new(tmp.path());
        store.write("AAPL", &[record(1, dec!(1))]).unwrap();
        store.write("MSFT", &[record(1, dec!(1))]).unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_files, 2);
        assert_eq!(stats.files, vec!["AAPL".to_string(), "MSFT".to_string()]);
        assert!(stats.total_size_mb > 0.0);

        assert!(store.remove("AAPL").unwrap());
        assert!(!store.remove("AAPL").unwrap());
        assert_eq!(store.remove_all().unwrap(), 1);
        assert_eq!(store.stats().unwrap().total_files, 0);
        assert!(tmp.path().join("notes.txt").exists());
    }

    #[test]
    fn test_path_for_rejects_escaping_tickers() {
        let tmp = tempdir().unwrap();
        let store = CsvFileStore::new(tmp.path().join("prices"));

        for ticker in ["../outside", "a/b", "/abs", "x\\y", "nul\0"] {
            assert!(
                matches!(store.path_for(ticker), Err(CacheError::InvalidTicker(_))),
                "{ticker:?} was accepted"
            );
        }
        assert!(store.path_for("^SPX").is_ok());
        assert!(store.path_for("BRK.B").is_ok());
    }

    #[test]
    fn test_remove_cannot_touch_files_outside_dir() {
        let tmp = tempdir().unwrap();
        let store = CsvFileStore::new(tmp.path().join("prices"));
        store.write("AAPL", &[record(1, dec!(1))]).unwrap();
        let outside = tmp.path().join("OUTSIDE.csv");
        fs::write(&outside, "keep me").unwrap();

        assert!(store.remove("../outside").is_err());
        assert!(store.write("../outside", &[record(1, dec!(1))]).is_err());
        assert!(store.load("../outside").is_err());
        assert_eq!(fs::read_to_string(&outside).unwrap(), "keep me");
    }

    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        let tmp = tempdir().unwrap();
        let store = CsvFileStore::new(tmp.path());
        // A directory in the way makes the final rename fail
        fs::create_dir(tmp.path().join("AAPL.csv")).unwrap();
        fs::write(tmp.path().join("AAPL.csv").join("occupied"), "x").unwrap();

        assert!(store.write("AAPL", &[record(1, dec!(1))]).is_err());
        assert!(!tmp.path().join("AAPL.csv.tmp").exists());
    }
}
