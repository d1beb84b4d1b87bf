use std::fs::File;
use std::path::Path;

use chrono::NaiveTime;
use serde::Deserialize;

use super::{PersistenceError, PersistenceResult, StoreSnapshot, validate_snapshot};
use crate::booking::{BookingRequest, DayOfWeek};
use crate::directory::DirectorySnapshot;

pub fn save_snapshot_to_json<P: AsRef<Path>>(snapshot: &StoreSnapshot, path: P) -> PersistenceResult<()> {
    validate_snapshot(snapshot)?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, snapshot)?;
    Ok(())
}

pub fn load_snapshot_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<StoreSnapshot> {
    let file = File::open(path)?;
    let snapshot: StoreSnapshot = serde_json::from_reader(file)?;
    validate_snapshot(&snapshot)?;
    Ok(snapshot)
}

pub fn load_directory_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<DirectorySnapshot> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

/// One row of a booking import file. Times accept `HH:MM` or `HH:MM:SS`.
#[derive(Deserialize)]
struct BookingCsvRecord {
    classroom_id: i64,
    subject_id: i64,
    teacher_id: i64,
    day_of_week: String,
    start_time: String,
    end_time: String,
    academic_year: String,
    semester: u8,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    is_active: String,
}

impl BookingCsvRecord {
    fn into_request(self, line: usize) -> PersistenceResult<BookingRequest> {
        let day_of_week = self
            .day_of_week
            .parse::<DayOfWeek>()
            .map_err(|err| PersistenceError::InvalidData(format!("line {line}: {err}")))?;
        let is_active = match self.is_active.trim() {
            "" => true,
            raw => raw.parse::<bool>().map_err(|_| {
                PersistenceError::InvalidData(format!("line {line}: invalid is_active '{raw}'"))
            })?,
        };
        let notes = Some(self.notes.trim().to_string()).filter(|notes| !notes.is_empty());

        Ok(BookingRequest {
            classroom_id: self.classroom_id,
            subject_id: self.subject_id,
            teacher_id: self.teacher_id,
            day_of_week,
            start_time: parse_clock(&self.start_time, line)?,
            end_time: parse_clock(&self.end_time, line)?,
            academic_year: self.academic_year.trim().to_string(),
            semester: self.semester,
            notes,
            is_active,
            skip_conflict_check: false,
            allow_overlap: false,
        })
    }
}

fn parse_clock(raw: &str, line: usize) -> PersistenceResult<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|err| PersistenceError::InvalidData(format!("line {line}: invalid time '{raw}': {err}")))
}

/// Reads booking requests for a bulk import. Line numbers in errors count the header as line 1.
pub fn load_booking_requests_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<Vec<BookingRequest>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut requests = Vec::new();
    for (index, record) in reader.deserialize::<BookingCsvRecord>().enumerate() {
        requests.push(record?.into_request(index + 2)?);
    }
    if requests.is_empty() {
        return Err(PersistenceError::InvalidData(
            "CSV file contained no bookings".into(),
        ));
    }
    Ok(requests)
}
