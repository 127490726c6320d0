//! CSV persistence for every artifact the pipelines produce and consume.

use csv::WriterBuilder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::parser::parse_datetime;

/// Writes `rows` to `path` with a header line, replacing any existing file.
///
/// Parent directories are created as needed.
pub fn write_records<T: Serialize>(path: &Path, rows: &[T]) -> PipelineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = WriterBuilder::new().has_headers(true).from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = rows.len(), "CSV written");
    Ok(())
}

/// Writes pre-formatted records under an explicit header, for tables whose
/// column names depend on runtime options.
pub fn write_table<I>(path: &Path, header: &[&str], rows: I) -> PipelineResult<usize>
where
    I: IntoIterator<Item = Vec<String>>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(header)?;
    let mut count = 0;
    for row in rows {
        writer.write_record(&row)?;
        count += 1;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = count, "CSV written");
    Ok(count)
}

/// Reads every row of a CSV file.
///
/// A missing file is reported as [`PipelineError::FileNotFound`]; a row that
/// does not deserialize fails the whole read with [`PipelineError::Parse`].
pub fn read_records<T: DeserializeOwned>(path: &Path) -> PipelineResult<Vec<T>> {
    let file = open_input(path)?;
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

    let mut rows = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let record: T = result.map_err(|e| PipelineError::Parse {
            path: path.to_path_buf(),
            reason: format!("row {}: {e}", line + 1),
        })?;
        rows.push(record);
    }

    debug!(path = %path.display(), rows = rows.len(), "CSV read");
    Ok(rows)
}

/// Reads a table keyed by a `datetime` column, dropping rows whose
/// timestamp does not parse. Any other malformed row still fails the read.
pub fn read_timestamped<T: DeserializeOwned>(path: &Path) -> PipelineResult<Vec<T>> {
    let file = open_input(path)?;
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let headers = rdr.headers()?.clone();
    let at = headers
        .iter()
        .position(|h| h == "datetime")
        .ok_or_else(|| PipelineError::Parse {
            path: path.to_path_buf(),
            reason: "missing datetime column".to_string(),
        })?;

    let mut rows = Vec::new();
    let mut dropped = 0usize;
    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        if record.get(at).and_then(parse_datetime).is_none() {
            dropped += 1;
            continue;
        }
        let row: T = record.deserialize(Some(&headers)).map_err(|e| PipelineError::Parse {
            path: path.to_path_buf(),
            reason: format!("row {}: {e}", line + 1),
        })?;
        rows.push(row);
    }

    if dropped > 0 {
        warn!(path = %path.display(), dropped, "Rows with unparseable datetime dropped");
    }
    debug!(path = %path.display(), rows = rows.len(), "CSV read");
    Ok(rows)
}

/// Opens an input file, mapping "not found" to [`PipelineError::FileNotFound`].
pub fn open_input(path: &Path) -> PipelineResult<File> {
    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PipelineError::FileNotFound(path.to_path_buf()),
        _ => PipelineError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        subject: String,
        value: f64,
    }

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    #[test]
    fn test_write_then_read_keeps_rows() {
        let path = temp_path("tag_presence_test_roundtrip.csv");
        let rows = vec![
            Row { subject: "giken".into(), value: 3333.333333333 },
            Row { subject: "airtro".into(), value: 0.0 },
        ];

        write_records(&path, &rows).unwrap();
        let back: Vec<Row> = read_records(&path).unwrap();

        assert_eq!(back.len(), 2);
        assert_eq!(back[0].subject, "giken");
        assert!((back[0].value - 3333.333333333).abs() < 1e-6);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_records_replaces_existing_file() {
        let path = temp_path("tag_presence_test_replace.csv");
        write_records(&path, &[Row { subject: "a".into(), value: 1.0 }]).unwrap();
        write_records(&path, &[Row { subject: "b".into(), value: 2.0 }]).unwrap();

        let back: Vec<Row> = read_records(&path).unwrap();
        assert_eq!(back, vec![Row { subject: "b".into(), value: 2.0 }]);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_write_table_uses_given_header() {
        let path = temp_path("tag_presence_test_table.csv");
        let count = write_table(
            &path,
            &["tag_name", "week_start"],
            vec![vec!["Sato".to_string(), "2025-09-01".to_string()]],
        )
        .unwrap();

        assert_eq!(count, 1);
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "tag_name,week_start\nSato,2025-09-01\n");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_missing_file_is_file_not_found() {
        let result: PipelineResult<Vec<Row>> = read_records(Path::new("definitely/not/here.csv"));
        assert!(matches!(result, Err(PipelineError::FileNotFound(_))));
    }

    #[test]
    fn test_read_timestamped_skips_bad_datetime_only() {
        use crate::records::ResolvedPosition;

        let path = temp_path("tag_presence_test_timestamped.csv");
        fs::write(
            &path,
            "datetime,node_id,tag_id,tag_rssi,tag_volt\n\
             2025-09-01 08:00:00,n1,t1,-50,3.0\n\
             not-a-time,n2,t1,-60,\n\
             2025-09-01 08:05:00,n2,t1,-40,\n",
        )
        .unwrap();

        let rows: Vec<ResolvedPosition> = read_timestamped(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].node_id, "n2");
        assert_eq!(rows[1].tag_volt, None);

        fs::write(&path, "datetime,node_id,tag_id,tag_rssi,tag_volt\n2025-09-01 08:00:00,n1,t1,loud,\n").unwrap();
        let result: PipelineResult<Vec<ResolvedPosition>> = read_timestamped(&path);
        assert!(matches!(result, Err(PipelineError::Parse { .. })));

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_bad_row_is_parse_error() {
        let path = temp_path("tag_presence_test_bad_row.csv");
        fs::write(&path, "subject,value\na,not-a-number\n").unwrap();

        let result: PipelineResult<Vec<Row>> = read_records(&path);
        assert!(matches!(result, Err(PipelineError::Parse { .. })));

        fs::remove_file(&path).unwrap();
    }
}
