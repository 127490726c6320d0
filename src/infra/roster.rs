//! Reservation roster loading.
//!
//! The roster comes out of the seat booking system as a spreadsheet
//! (`.xlsx`, `.xls`, `.ods`) or as a CSV export with the same columns:
//! `User, CheckInTime, CheckOutTime, SeatNumber, Area`. Only the first sheet
//! is read.

use calamine::{Data, DataType, Reader, open_workbook_auto};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::output::read_records;
use crate::parser::parse_datetime;
use crate::records::Reservation;

const USER: &str = "User";
const CHECK_IN: &str = "CheckInTime";
const CHECK_OUT: &str = "CheckOutTime";
const SEAT: &str = "SeatNumber";
const AREA: &str = "Area";

/// Loads the roster, choosing the reader from the file extension.
pub fn load_roster(path: &Path) -> PipelineResult<Vec<Reservation>> {
    if !path.exists() {
        return Err(PipelineError::FileNotFound(path.to_path_buf()));
    }

    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    let rows = if is_csv { load_csv(path)? } else { load_sheet(path)? };
    info!(path = %path.display(), rows = rows.len(), "Roster loaded");
    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct RosterRecord {
    #[serde(rename = "User")]
    user: String,
    #[serde(rename = "CheckInTime", default)]
    check_in: Option<String>,
    #[serde(rename = "CheckOutTime", default)]
    check_out: Option<String>,
    #[serde(rename = "SeatNumber", default)]
    seat_number: Option<String>,
    #[serde(rename = "Area", default)]
    area: Option<String>,
}

fn load_csv(path: &Path) -> PipelineResult<Vec<Reservation>> {
    let records: Vec<RosterRecord> = read_records(path)?;
    Ok(records
        .into_iter()
        .map(|r| Reservation {
            user: r.user.trim().to_string(),
            check_in: r.check_in.as_deref().and_then(parse_datetime),
            check_out: r.check_out.as_deref().and_then(parse_datetime),
            seat_number: non_empty(r.seat_number),
            area: non_empty(r.area),
        })
        .collect())
}

fn load_sheet(path: &Path) -> PipelineResult<Vec<Reservation>> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::Parse {
            path: path.to_path_buf(),
            reason: "workbook has no sheets".to_string(),
        })??;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        warn!(path = %path.display(), "Roster sheet is empty");
        return Ok(Vec::new());
    };

    let column = |name: &str| {
        header
            .iter()
            .position(|cell| cell.as_string().is_some_and(|s| s.trim() == name))
    };
    let missing = |name: &str| PipelineError::Parse {
        path: path.to_path_buf(),
        reason: format!("column '{name}' not found"),
    };

    let user_col = column(USER).ok_or_else(|| missing(USER))?;
    let check_in_col = column(CHECK_IN).ok_or_else(|| missing(CHECK_IN))?;
    let check_out_col = column(CHECK_OUT);
    let seat_col = column(SEAT);
    let area_col = column(AREA);

    let reservations = rows
        .filter_map(|row| {
            let user = cell_text(row.get(user_col)?)?;
            let at = |col: Option<usize>| col.and_then(|c| row.get(c)).and_then(cell_datetime);
            let text = |col: Option<usize>| col.and_then(|c| row.get(c)).and_then(cell_text);
            Some(Reservation {
                user,
                check_in: at(Some(check_in_col)),
                check_out: at(check_out_col),
                seat_number: text(seat_col),
                area: text(area_col),
            })
        })
        .collect();

    Ok(reservations)
}

fn cell_text(cell: &Data) -> Option<String> {
    non_empty(cell.as_string())
}

/// Native date cells, serial numbers, or text the CSV parser understands.
fn cell_datetime(cell: &Data) -> Option<chrono::NaiveDateTime> {
    match cell {
        Data::String(s) => parse_datetime(s),
        other => other.as_datetime(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;

    #[test]
    fn test_csv_roster_parses_times_and_blanks() {
        let path = env::temp_dir().join("tag_presence_test_roster.csv");
        fs::write(
            &path,
            "User,CheckInTime,CheckOutTime,SeatNumber,Area\n\
             Sato,2025/09/01 09:00,2025/09/01 12:00,A-12,North\n\
             Ito,2025-09-02 10:00:00,,,\n",
        )
        .unwrap();

        let rows = load_roster(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user, "Sato");
        assert_eq!(rows[0].check_in, parse_datetime("2025-09-01 09:00:00"));
        assert_eq!(rows[0].area.as_deref(), Some("North"));
        assert_eq!(rows[1].check_out, None);
        assert_eq!(rows[1].seat_number, None);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_roster_is_file_not_found() {
        let result = load_roster(Path::new("no/such/roster.xlsx"));
        assert!(matches!(result, Err(PipelineError::FileNotFound(_))));
    }

    #[test]
    fn test_string_cells_parse_as_datetimes() {
        let cell = Data::String("2025-09-01 09:30:00".to_string());
        assert_eq!(cell_datetime(&cell), parse_datetime("2025-09-01 09:30:00"));
        assert_eq!(cell_datetime(&Data::Empty), None);
    }
}
