use std::path::Path;
use std::sync::Mutex;

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{Connection, OptionalExtension, Params, Row, params};

use super::{ActivityStore, BookingStore, Directory, PersistenceError, PersistenceResult};
use crate::activity::{Activity, ActivityId};
use crate::booking::{Booking, BookingId, DayOfWeek};
use crate::directory::{Classroom, ClassroomId, DirectorySnapshot, Subject, SubjectId, Teacher, TeacherId};
use crate::period::AcademicPeriod;
use crate::query::{DateRange, ResourceRef};

const TIME_FORMAT: &str = "%H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

const BOOKING_COLUMNS: &str = "id, classroom_id, subject_id, teacher_id, day_of_week, start_time, \
     end_time, academic_year, semester, is_active, notes";
const ACTIVITY_COLUMNS: &str = "id, booking_id, date, start_time, end_time, topic, description, \
     notes, is_completed, subject_id, classroom_id, teacher_id";

pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS classrooms (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                code TEXT NOT NULL,
                capacity INTEGER,
                location TEXT
            );
            CREATE TABLE IF NOT EXISTS subjects (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                code TEXT NOT NULL,
                credits INTEGER
            );
            CREATE TABLE IF NOT EXISTS teachers (
                id INTEGER PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                username TEXT NOT NULL,
                email TEXT
            );
            CREATE TABLE IF NOT EXISTS bookings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                classroom_id INTEGER NOT NULL REFERENCES classrooms(id),
                subject_id INTEGER NOT NULL REFERENCES subjects(id),
                teacher_id INTEGER NOT NULL REFERENCES teachers(id),
                day_of_week INTEGER NOT NULL CHECK (day_of_week BETWEEN 1 AND 7),
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                academic_year TEXT NOT NULL,
                semester INTEGER NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                notes TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_bookings_teacher_day
                ON bookings (teacher_id, day_of_week, academic_year, semester);
            CREATE INDEX IF NOT EXISTS idx_bookings_classroom_day
                ON bookings (classroom_id, day_of_week, academic_year, semester);
            CREATE TABLE IF NOT EXISTS activities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                booking_id INTEGER NOT NULL REFERENCES bookings(id) ON DELETE CASCADE,
                date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                topic TEXT NOT NULL,
                description TEXT,
                notes TEXT,
                is_completed INTEGER NOT NULL DEFAULT 0,
                subject_id INTEGER NOT NULL REFERENCES subjects(id),
                classroom_id INTEGER NOT NULL REFERENCES classrooms(id),
                teacher_id INTEGER NOT NULL REFERENCES teachers(id),
                UNIQUE (booking_id, date)
            );
            CREATE INDEX IF NOT EXISTS idx_activities_date ON activities (date);
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn query_bookings<P: Params>(&self, filter: &str, params: P) -> PersistenceResult<Vec<Booking>> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings {filter} ORDER BY day_of_week, start_time, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, BookingRow::read)?;
        let mut bookings = Vec::new();
        for row in rows {
            bookings.push(row?.into_booking()?);
        }
        Ok(bookings)
    }

    fn query_activities<P: Params>(&self, filter: &str, params: P) -> PersistenceResult<Vec<Activity>> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let sql = format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities {filter} ORDER BY date, start_time, id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, ActivityRow::read)?;
        let mut activities = Vec::new();
        for row in rows {
            activities.push(row?.into_activity()?);
        }
        Ok(activities)
    }
}

struct BookingRow {
    id: i64,
    classroom_id: i64,
    subject_id: i64,
    teacher_id: i64,
    day_of_week: u8,
    start_time: String,
    end_time: String,
    academic_year: String,
    semester: u8,
    is_active: bool,
    notes: Option<String>,
}

impl BookingRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            classroom_id: row.get(1)?,
            subject_id: row.get(2)?,
            teacher_id: row.get(3)?,
            day_of_week: row.get(4)?,
            start_time: row.get(5)?,
            end_time: row.get(6)?,
            academic_year: row.get(7)?,
            semester: row.get(8)?,
            is_active: row.get(9)?,
            notes: row.get(10)?,
        })
    }

    fn into_booking(self) -> PersistenceResult<Booking> {
        let day_of_week = DayOfWeek::from_number(self.day_of_week).ok_or_else(|| {
            PersistenceError::InvalidData(format!(
                "booking {} has invalid day number {}",
                self.id, self.day_of_week
            ))
        })?;
        Ok(Booking {
            id: self.id,
            classroom_id: self.classroom_id,
            subject_id: self.subject_id,
            teacher_id: self.teacher_id,
            day_of_week,
            start_time: parse_time(&self.start_time)?,
            end_time: parse_time(&self.end_time)?,
            academic_year: self.academic_year,
            semester: self.semester,
            is_active: self.is_active,
            notes: self.notes,
        })
    }
}

struct ActivityRow {
    id: i64,
    booking_id: i64,
    date: String,
    start_time: String,
    end_time: String,
    topic: String,
    description: Option<String>,
    notes: Option<String>,
    is_completed: bool,
    subject_id: i64,
    classroom_id: i64,
    teacher_id: i64,
}

impl ActivityRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            booking_id: row.get(1)?,
            date: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            topic: row.get(5)?,
            description: row.get(6)?,
            notes: row.get(7)?,
            is_completed: row.get(8)?,
            subject_id: row.get(9)?,
            classroom_id: row.get(10)?,
            teacher_id: row.get(11)?,
        })
    }

    fn into_activity(self) -> PersistenceResult<Activity> {
        Ok(Activity {
            id: self.id,
            booking_id: self.booking_id,
            date: parse_date(&self.date)?,
            start_time: parse_time(&self.start_time)?,
            end_time: parse_time(&self.end_time)?,
            topic: self.topic,
            description: self.description,
            notes: self.notes,
            is_completed: self.is_completed,
            subject_id: self.subject_id,
            classroom_id: self.classroom_id,
            teacher_id: self.teacher_id,
        })
    }
}

fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_time(raw: &str) -> PersistenceResult<NaiveTime> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .map_err(|err| PersistenceError::InvalidData(format!("invalid time '{raw}': {err}")))
}

fn parse_date(raw: &str) -> PersistenceResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|err| PersistenceError::InvalidData(format!("invalid date '{raw}': {err}")))
}

impl Directory for SqliteStore {
    fn classroom(&self, id: ClassroomId) -> PersistenceResult<Option<Classroom>> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let classroom = conn
            .query_row(
                "SELECT id, name, code, capacity, location FROM classrooms WHERE id = ?1",
                params![id],
                read_classroom,
            )
            .optional()?;
        Ok(classroom)
    }

    fn subject(&self, id: SubjectId) -> PersistenceResult<Option<Subject>> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let subject = conn
            .query_row(
                "SELECT id, name, code, credits FROM subjects WHERE id = ?1",
                params![id],
                read_subject,
            )
            .optional()?;
        Ok(subject)
    }

    fn teacher(&self, id: TeacherId) -> PersistenceResult<Option<Teacher>> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let teacher = conn
            .query_row(
                "SELECT id, first_name, last_name, username, email FROM teachers WHERE id = ?1",
                params![id],
                read_teacher,
            )
            .optional()?;
        Ok(teacher)
    }

    fn directory_snapshot(&self) -> PersistenceResult<DirectorySnapshot> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let mut snapshot = DirectorySnapshot::default();

        let mut stmt = conn.prepare("SELECT id, name, code, capacity, location FROM classrooms ORDER BY id")?;
        for classroom in stmt.query_map([], read_classroom)? {
            snapshot.classrooms.push(classroom?);
        }
        let mut stmt = conn.prepare("SELECT id, name, code, credits FROM subjects ORDER BY id")?;
        for subject in stmt.query_map([], read_subject)? {
            snapshot.subjects.push(subject?);
        }
        let mut stmt =
            conn.prepare("SELECT id, first_name, last_name, username, email FROM teachers ORDER BY id")?;
        for teacher in stmt.query_map([], read_teacher)? {
            snapshot.teachers.push(teacher?);
        }
        Ok(snapshot)
    }

    fn load_directory(&mut self, snapshot: &DirectorySnapshot) -> PersistenceResult<()> {
        let mut conn = self.connection.lock().expect("sqlite mutex poisoned");
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO classrooms (id, name, code, capacity, location) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, code = excluded.code,
                 capacity = excluded.capacity, location = excluded.location",
            )?;
            for c in &snapshot.classrooms {
                stmt.execute(params![c.id, c.name, c.code, c.capacity, c.location])?;
            }
            let mut stmt = tx.prepare(
                "INSERT INTO subjects (id, name, code, credits) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, code = excluded.code,
                 credits = excluded.credits",
            )?;
            for s in &snapshot.subjects {
                stmt.execute(params![s.id, s.name, s.code, s.credits])?;
            }
            let mut stmt = tx.prepare(
                "INSERT INTO teachers (id, first_name, last_name, username, email) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET first_name = excluded.first_name,
                 last_name = excluded.last_name, username = excluded.username, email = excluded.email",
            )?;
            for t in &snapshot.teachers {
                stmt.execute(params![t.id, t.first_name, t.last_name, t.username, t.email])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn read_classroom(row: &Row<'_>) -> rusqlite::Result<Classroom> {
    Ok(Classroom {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        capacity: row.get(3)?,
        location: row.get(4)?,
    })
}

fn read_subject(row: &Row<'_>) -> rusqlite::Result<Subject> {
    Ok(Subject {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        credits: row.get(3)?,
    })
}

fn read_teacher(row: &Row<'_>) -> rusqlite::Result<Teacher> {
    Ok(Teacher {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        username: row.get(3)?,
        email: row.get(4)?,
    })
}

impl BookingStore for SqliteStore {
    fn insert_booking(&mut self, mut booking: Booking) -> PersistenceResult<Booking> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        conn.execute(
            "INSERT INTO bookings (classroom_id, subject_id, teacher_id, day_of_week, start_time, \
             end_time, academic_year, semester, is_active, notes) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                booking.classroom_id,
                booking.subject_id,
                booking.teacher_id,
                booking.day_of_week.number(),
                format_time(booking.start_time),
                format_time(booking.end_time),
                booking.academic_year,
                booking.semester,
                booking.is_active,
                booking.notes,
            ],
        )?;
        booking.id = conn.last_insert_rowid();
        Ok(booking)
    }

    fn update_booking(&mut self, booking: &Booking) -> PersistenceResult<bool> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let changed = conn.execute(
            "UPDATE bookings SET classroom_id = ?2, subject_id = ?3, teacher_id = ?4, \
             day_of_week = ?5, start_time = ?6, end_time = ?7, academic_year = ?8, semester = ?9, \
             is_active = ?10, notes = ?11 WHERE id = ?1",
            params![
                booking.id,
                booking.classroom_id,
                booking.subject_id,
                booking.teacher_id,
                booking.day_of_week.number(),
                format_time(booking.start_time),
                format_time(booking.end_time),
                booking.academic_year,
                booking.semester,
                booking.is_active,
                booking.notes,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_booking(&mut self, id: BookingId) -> PersistenceResult<bool> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let changed = conn.execute("DELETE FROM bookings WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn booking(&self, id: BookingId) -> PersistenceResult<Option<Booking>> {
        Ok(self.query_bookings("WHERE id = ?1", params![id])?.into_iter().next())
    }

    fn bookings_for_teacher_on(
        &self,
        teacher_id: TeacherId,
        day: DayOfWeek,
        period: &AcademicPeriod,
    ) -> PersistenceResult<Vec<Booking>> {
        self.query_bookings(
            "WHERE teacher_id = ?1 AND day_of_week = ?2 AND academic_year = ?3 AND semester = ?4",
            params![teacher_id, day.number(), period.academic_year, period.semester],
        )
    }

    fn bookings_for_classroom_on(
        &self,
        classroom_id: ClassroomId,
        day: DayOfWeek,
        period: &AcademicPeriod,
    ) -> PersistenceResult<Vec<Booking>> {
        self.query_bookings(
            "WHERE classroom_id = ?1 AND day_of_week = ?2 AND academic_year = ?3 AND semester = ?4",
            params![classroom_id, day.number(), period.academic_year, period.semester],
        )
    }

    fn bookings_in_period(&self, period: &AcademicPeriod) -> PersistenceResult<Vec<Booking>> {
        self.query_bookings(
            "WHERE academic_year = ?1 AND semester = ?2",
            params![period.academic_year, period.semester],
        )
    }

    fn bookings_for(&self, resource: ResourceRef, period: &AcademicPeriod) -> PersistenceResult<Vec<Booking>> {
        let column = resource_column(resource);
        self.query_bookings(
            &format!("WHERE {column} = ?1 AND academic_year = ?2 AND semester = ?3"),
            params![resource.id(), period.academic_year, period.semester],
        )
    }

    fn all_bookings(&self) -> PersistenceResult<Vec<Booking>> {
        let mut bookings = self.query_bookings("", [])?;
        bookings.sort_by_key(|booking| booking.id);
        Ok(bookings)
    }
}

fn resource_column(resource: ResourceRef) -> &'static str {
    match resource {
        ResourceRef::Classroom(_) => "classroom_id",
        ResourceRef::Teacher(_) => "teacher_id",
        ResourceRef::Subject(_) => "subject_id",
    }
}

impl ActivityStore for SqliteStore {
    fn insert_activity(&mut self, mut activity: Activity) -> PersistenceResult<Activity> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        conn.execute(
            "INSERT INTO activities (booking_id, date, start_time, end_time, topic, description, \
             notes, is_completed, subject_id, classroom_id, teacher_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                activity.booking_id,
                format_date(activity.date),
                format_time(activity.start_time),
                format_time(activity.end_time),
                activity.topic,
                activity.description,
                activity.notes,
                activity.is_completed,
                activity.subject_id,
                activity.classroom_id,
                activity.teacher_id,
            ],
        )?;
        activity.id = conn.last_insert_rowid();
        Ok(activity)
    }

    fn update_activity(&mut self, activity: &Activity) -> PersistenceResult<bool> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let changed = conn.execute(
            "UPDATE activities SET date = ?2, start_time = ?3, end_time = ?4, topic = ?5, \
             description = ?6, notes = ?7, is_completed = ?8, subject_id = ?9, classroom_id = ?10, \
             teacher_id = ?11 WHERE id = ?1",
            params![
                activity.id,
                format_date(activity.date),
                format_time(activity.start_time),
                format_time(activity.end_time),
                activity.topic,
                activity.description,
                activity.notes,
                activity.is_completed,
                activity.subject_id,
                activity.classroom_id,
                activity.teacher_id,
            ],
        )?;
        Ok(changed > 0)
    }

    fn delete_activity(&mut self, id: ActivityId) -> PersistenceResult<bool> {
        let conn = self.connection.lock().expect("sqlite mutex poisoned");
        let changed = conn.execute("DELETE FROM activities WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn activity(&self, id: ActivityId) -> PersistenceResult<Option<Activity>> {
        Ok(self.query_activities("WHERE id = ?1", params![id])?.into_iter().next())
    }

    fn activity_for_booking_on(&self, booking_id: BookingId, date: NaiveDate) -> PersistenceResult<Option<Activity>> {
        Ok(self
            .query_activities(
                "WHERE booking_id = ?1 AND date = ?2",
                params![booking_id, format_date(date)],
            )?
            .into_iter()
            .next())
    }

    fn activities_for(&self, resource: ResourceRef, range: &DateRange) -> PersistenceResult<Vec<Activity>> {
        let column = resource_column(resource);
        self.query_activities(
            &format!("WHERE {column} = ?1 AND date BETWEEN ?2 AND ?3"),
            params![resource.id(), format_date(range.start), format_date(range.end)],
        )
    }

    fn activities_on(&self, date: NaiveDate) -> PersistenceResult<Vec<Activity>> {
        self.query_activities("WHERE date = ?1", params![format_date(date)])
    }

    fn all_activities(&self) -> PersistenceResult<Vec<Activity>> {
        let mut activities = self.query_activities("", [])?;
        activities.sort_by_key(|activity| activity.id);
        Ok(activities)
    }
}
