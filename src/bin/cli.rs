use chrono::{NaiveDate, NaiveTime};
use school_timetable::{
    AcademicPeriod, ActivitySearch, ActivityView, BookingPatch, BookingRequest, BookingSearch,
    BookingView, BulkBookingRequest, Conflict, DateRange, DayOfWeek, MemoryStore,
    ScheduleError, ScheduleManager, SchoolCalendar, Timetable, load_booking_requests_from_csv,
    load_directory_from_json, load_snapshot_from_json, save_snapshot_to_json,
};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

fn render_row<'a>(widths: &[usize], cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = String::from("|");
    for (ci, cell) in cells.enumerate() {
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(widths[ci].saturating_sub(cell.len())));
        line.push_str(" |");
    }
    line
}

fn render_text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (ci, cell) in row.iter().enumerate() {
            if cell.len() > widths[ci] {
                widths[ci] = cell.len();
            }
        }
    }

    let mut sep = String::from("+");
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');
    out.push_str(&render_row(&widths, headers.iter().copied()));
    out.push('\n');
    out.push_str(&sep);
    out.push('\n');
    for row in rows {
        out.push_str(&render_row(&widths, row.iter().map(String::as_str)));
        out.push('\n');
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

fn render_bookings(views: &[BookingView]) -> String {
    let rows: Vec<Vec<String>> = views
        .iter()
        .map(|view| {
            vec![
                view.id().to_string(),
                view.booking.day_of_week.to_string(),
                view.time_range(),
                view.subject.code.clone(),
                view.teacher.full_name(),
                view.classroom.code.clone(),
                view.booking.period().to_string(),
                if view.booking.is_active { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    render_text_table(
        &["id", "day", "time", "subject", "teacher", "classroom", "period", "active"],
        &rows,
    )
}

fn render_activities(views: &[ActivityView]) -> String {
    let rows: Vec<Vec<String>> = views
        .iter()
        .map(|view| {
            vec![
                view.id().to_string(),
                view.activity.booking_id.to_string(),
                view.activity.date.to_string(),
                view.time_range.clone(),
                view.activity.topic.clone(),
                view.teacher.full_name(),
                view.classroom.code.clone(),
                if view.activity.is_completed { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    render_text_table(
        &["id", "booking", "date", "time", "topic", "teacher", "classroom", "done"],
        &rows,
    )
}

fn render_conflicts(conflicts: &[Conflict]) -> String {
    let rows: Vec<Vec<String>> = conflicts
        .iter()
        .map(|conflict| {
            vec![
                conflict.kind.as_str().to_string(),
                conflict
                    .checked_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                conflict.conflicting_id.to_string(),
                conflict.conflicting_entity.clone(),
                conflict.day_of_week.to_string(),
                format!(
                    "{} - {}",
                    conflict.overlap_start.format("%H:%M"),
                    conflict.overlap_end.format("%H:%M")
                ),
            ]
        })
        .collect();
    render_text_table(
        &["kind", "booking", "conflicts with", "resource", "day", "overlap"],
        &rows,
    )
}

fn print_timetable(timetable: &Timetable) {
    println!(
        "{} - {} ({}) {} semester {}",
        timetable.title,
        timetable.entity_name,
        timetable.entity_code,
        timetable.academic_year,
        timetable.semester
    );
    for (day, slots) in &timetable.weekly_schedule {
        if slots.is_empty() {
            continue;
        }
        println!("{day}");
        for slot in slots {
            println!(
                "  {}  {} ({})  {}  {}",
                slot.time_range,
                slot.subject_name,
                slot.subject_code,
                slot.teacher_name,
                slot.classroom_name
            );
        }
    }
    println!(
        "Sessions: {}  Hours: {}",
        timetable.total_sessions, timetable.total_hours
    );
}

fn print_error(err: &ScheduleError) {
    println!("Error: {err}");
    if let ScheduleError::Conflict(conflicts) = err {
        print!("{}", render_conflicts(conflicts));
    }
}

fn print_help() {
    println!(
        "Commands:\n  help                               Show this help\n  directory load <json_path>         Load classrooms, subjects and teachers\n  directory show                     List directory records\n  calendar load <json_path>          Load school days and holidays\n  show                               List all bookings\n  add <class> <subject> <teacher> <day> <HH:MM> <HH:MM> <YYYY/YYYY> <semester> [notes...]\n                                     Create a booking\n  update <id> <day> <HH:MM> <HH:MM>  Move a booking to another slot\n  deactivate <id>                    Mark a booking inactive\n  delete <id>                        Delete a booking and its activities\n  import <csv_path> [continue]       Bulk create bookings from CSV\n  audit <YYYY/YYYY> <semester>       List conflicts between stored bookings\n  summary <YYYY/YYYY> <semester>     Conflict counts and clusters\n  timetable <class|teacher|subject> <id> <YYYY/YYYY> <semester>\n                                     Print a weekly timetable\n  generate <booking_id> <YYYY-MM-DD> <topic...>\n                                     Create the activity of a booking on a date\n  generate range <YYYY-MM-DD> <YYYY-MM-DD> <ids_csv> <topic...>\n                                     Create activities for every school day\n  activities [YYYY-MM-DD]            List activities (optionally for one date)\n  complete <activity_id> [notes...]  Mark an activity completed\n  save <json_path>                   Persist directory, bookings and activities\n  load <json_path>                   Replace state from a saved snapshot\n  quit|exit                          Exit"
    );
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_id_list(s: &str) -> Vec<i64> {
    s.split(',')
        .filter_map(|p| p.trim().parse::<i64>().ok())
        .collect()
}

fn parse_period(year: Option<&str>, semester: Option<&str>) -> Option<AcademicPeriod> {
    let semester = semester?.parse::<u8>().ok()?;
    Some(AcademicPeriod::new(year?, semester))
}

fn all_bookings(manager: &ScheduleManager) -> Result<Vec<BookingView>, ScheduleError> {
    let search = BookingSearch {
        size: usize::MAX,
        ..BookingSearch::default()
    };
    Ok(manager.search_bookings(&search)?.items)
}

fn main() {
    // stdout belongs to the REPL; library events go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let mut manager = ScheduleManager::new(MemoryStore::new());
    let mut calendar = SchoolCalendar::default();

    println!("School Timetable (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "directory" => match parts.next() {
                Some("load") => match parts.next() {
                    Some(path) => match load_directory_from_json(path) {
                        Ok(directory) => match manager.store_mut().load_directory(&directory) {
                            Ok(_) => println!(
                                "Directory loaded: {} classrooms, {} subjects, {} teachers.",
                                directory.classrooms.len(),
                                directory.subjects.len(),
                                directory.teachers.len()
                            ),
                            Err(e) => println!("Error loading directory: {e}"),
                        },
                        Err(e) => println!("Error reading {path}: {e}"),
                    },
                    None => println!("Usage: directory load <json_path>"),
                },
                Some("show") | None => match manager.store().directory_snapshot() {
                    Ok(directory) => {
                        let mut rows = Vec::new();
                        for c in &directory.classrooms {
                            rows.push(vec!["classroom".into(), c.id.to_string(), c.code.clone(), c.name.clone()]);
                        }
                        for s in &directory.subjects {
                            rows.push(vec!["subject".into(), s.id.to_string(), s.code.clone(), s.name.clone()]);
                        }
                        for t in &directory.teachers {
                            rows.push(vec!["teacher".into(), t.id.to_string(), t.username.clone(), t.full_name()]);
                        }
                        print!("{}", render_text_table(&["kind", "id", "code", "name"], &rows));
                    }
                    Err(e) => println!("Error: {e}"),
                },
                Some(other) => {
                    println!("Unknown directory command '{other}'.");
                    println!("Usage: directory show|load <json_path>");
                }
            },
            "calendar" => match (parts.next(), parts.next()) {
                (Some("load"), Some(path)) => match SchoolCalendar::from_json_file(path) {
                    Ok(loaded) => {
                        calendar = loaded;
                        let config = calendar.to_config();
                        println!(
                            "Calendar loaded: {} school days, {} holidays.",
                            config.school_days().len(),
                            config.holidays().len()
                        );
                    }
                    Err(e) => println!("Error loading calendar: {e}"),
                },
                _ => println!("Usage: calendar load <json_path>"),
            },
            "show" => match all_bookings(&manager) {
                Ok(views) => print!("{}", render_bookings(&views)),
                Err(e) => print_error(&e),
            },
            "add" => {
                let args: Vec<&str> = parts.by_ref().take(8).collect();
                let notes: Vec<&str> = parts.collect();
                if args.len() < 8 {
                    println!(
                        "Usage: add <class> <subject> <teacher> <day> <HH:MM> <HH:MM> <YYYY/YYYY> <semester> [notes...]"
                    );
                    continue;
                }
                let ids: Vec<i64> = match args[..3].iter().map(|s| s.parse::<i64>()).collect() {
                    Ok(ids) => ids,
                    Err(_) => {
                        println!("Invalid id");
                        continue;
                    }
                };
                let day = match args[3].parse::<DayOfWeek>() {
                    Ok(day) => day,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };
                let (Some(start), Some(end)) = (parse_time(args[4]), parse_time(args[5])) else {
                    println!("Invalid time (HH:MM)");
                    continue;
                };
                let Some(period) = parse_period(Some(args[6]), Some(args[7])) else {
                    println!("Invalid semester");
                    continue;
                };
                let mut request = BookingRequest::new(ids[0], ids[1], ids[2], day, start, end, &period);
                if !notes.is_empty() {
                    request = request.with_notes(notes.join(" "));
                }
                match manager.create_booking(request) {
                    Ok(view) => {
                        println!("Booking {} created.", view.id());
                        print!("{}", render_bookings(&[view]));
                    }
                    Err(e) => print_error(&e),
                }
            }
            "update" => {
                let args: Vec<&str> = parts.collect();
                if args.len() != 4 {
                    println!("Usage: update <id> <day> <HH:MM> <HH:MM>");
                    continue;
                }
                let Ok(id) = args[0].parse::<i64>() else {
                    println!("Invalid id");
                    continue;
                };
                let day = match args[1].parse::<DayOfWeek>() {
                    Ok(day) => day,
                    Err(e) => {
                        println!("{e}");
                        continue;
                    }
                };
                let (Some(start), Some(end)) = (parse_time(args[2]), parse_time(args[3])) else {
                    println!("Invalid time (HH:MM)");
                    continue;
                };
                let patch = BookingPatch {
                    day_of_week: Some(day),
                    start_time: Some(start),
                    end_time: Some(end),
                    ..BookingPatch::default()
                };
                match manager.update_booking(id, patch) {
                    Ok(view) => {
                        println!("Booking {id} updated.");
                        print!("{}", render_bookings(&[view]));
                    }
                    Err(e) => print_error(&e),
                }
            }
            "deactivate" => match parts.next().map(str::parse::<i64>) {
                Some(Ok(id)) => {
                    let patch = BookingPatch {
                        is_active: Some(false),
                        ..BookingPatch::default()
                    };
                    match manager.update_booking(id, patch) {
                        Ok(_) => println!("Booking {id} deactivated."),
                        Err(e) => print_error(&e),
                    }
                }
                Some(Err(_)) => println!("Invalid id"),
                None => println!("Usage: deactivate <id>"),
            },
            "delete" => match parts.next().map(str::parse::<i64>) {
                Some(Ok(id)) => match manager.delete_booking(id) {
                    Ok(_) => println!("Deleted booking {id}."),
                    Err(e) => print_error(&e),
                },
                Some(Err(_)) => println!("Invalid id"),
                None => println!("Usage: delete <id>"),
            },
            "import" => {
                let path = parts.next();
                let keep_going = parts.next() == Some("continue");
                match path {
                    Some(path) => match load_booking_requests_from_csv(path) {
                        Ok(requests) => {
                            let mut bulk = BulkBookingRequest::new(requests);
                            if keep_going {
                                bulk = bulk.continue_on_error();
                            }
                            match manager.create_bulk(bulk) {
                                Ok(outcome) => {
                                    println!(
                                        "Imported {} bookings, {} failed.",
                                        outcome.created.len(),
                                        outcome.errors.len()
                                    );
                                    for err in &outcome.errors {
                                        println!("  {err}");
                                    }
                                }
                                Err(e) => print_error(&e),
                            }
                        }
                        Err(e) => println!("Error reading {path}: {e}"),
                    },
                    None => println!("Usage: import <csv_path> [continue]"),
                }
            }
            "audit" | "summary" => {
                let Some(period) = parse_period(parts.next(), parts.next()) else {
                    println!("Usage: {cmd} <YYYY/YYYY> <semester>");
                    continue;
                };
                if cmd == "audit" {
                    match manager.detect_existing_conflicts(&period) {
                        Ok(conflicts) if conflicts.is_empty() => {
                            println!("No conflicts in {period}.")
                        }
                        Ok(conflicts) => {
                            println!("{} conflicts in {period}.", conflicts.len());
                            print!("{}", render_conflicts(&conflicts));
                        }
                        Err(e) => print_error(&e),
                    }
                } else {
                    match manager.conflict_summary(&period) {
                        Ok(summary) => {
                            println!("Total conflicts    : {}", summary.total_conflicts);
                            println!("Teacher conflicts  : {}", summary.teacher_conflicts);
                            println!("Classroom conflicts: {}", summary.classroom_conflicts);
                            println!("Affected bookings  : {}", summary.affected_bookings);
                            for cluster in &summary.clusters {
                                let ids: Vec<String> = cluster.iter().map(|id| id.to_string()).collect();
                                println!("  cluster: {}", ids.join(", "));
                            }
                        }
                        Err(e) => print_error(&e),
                    }
                }
            }
            "timetable" => {
                let kind = parts.next();
                let id = parts.next().and_then(|s| s.parse::<i64>().ok());
                let period = parse_period(parts.next(), parts.next());
                let (Some(kind), Some(id), Some(period)) = (kind, id, period) else {
                    println!("Usage: timetable <class|teacher|subject> <id> <YYYY/YYYY> <semester>");
                    continue;
                };
                let result = match kind {
                    "class" | "classroom" => manager.generate_class_timetable(id, &period),
                    "teacher" => manager.generate_teacher_timetable(id, &period),
                    "subject" => manager.generate_subject_timetable(id, &period),
                    other => {
                        println!("Unknown timetable kind '{other}'.");
                        continue;
                    }
                };
                match result {
                    Ok(timetable) => print_timetable(&timetable),
                    Err(e) => print_error(&e),
                }
            }
            "generate" => {
                let first = parts.next();
                if first == Some("range") {
                    let start = parts.next().and_then(parse_date);
                    let end = parts.next().and_then(parse_date);
                    let ids = parts.next().map(parse_id_list);
                    let topic: Vec<&str> = parts.collect();
                    let (Some(start), Some(end), Some(ids)) = (start, end, ids) else {
                        println!("Usage: generate range <YYYY-MM-DD> <YYYY-MM-DD> <ids_csv> <topic...>");
                        continue;
                    };
                    let range = match DateRange::new(start, end) {
                        Ok(range) => range,
                        Err(e) => {
                            print_error(&e);
                            continue;
                        }
                    };
                    match manager.generate_activities_for_range(&ids, &range, &topic.join(" "), &calendar) {
                        Ok(report) => {
                            println!(
                                "Generated {} activities, skipped {} dates.",
                                report.generated.len(),
                                report.skipped.len()
                            );
                            for skipped in &report.skipped {
                                println!("  booking {} on {}: {}", skipped.booking_id, skipped.date, skipped.reason);
                            }
                        }
                        Err(e) => print_error(&e),
                    }
                    continue;
                }
                let booking_id = first.and_then(|s| s.parse::<i64>().ok());
                let date = parts.next().and_then(parse_date);
                let topic: Vec<&str> = parts.collect();
                let (Some(booking_id), Some(date)) = (booking_id, date) else {
                    println!("Usage: generate <booking_id> <YYYY-MM-DD> <topic...>");
                    continue;
                };
                match manager.generate_activity(booking_id, date, topic.join(" ")) {
                    Ok(view) => {
                        println!("Activity {} created.", view.id());
                        print!("{}", render_activities(&[view]));
                    }
                    Err(e) => print_error(&e),
                }
            }
            "activities" => {
                let result = match parts.next() {
                    Some(date_s) => match parse_date(date_s) {
                        Some(date) => manager.activities_on(date),
                        None => {
                            println!("Invalid date (YYYY-MM-DD)");
                            continue;
                        }
                    },
                    None => {
                        let search = ActivitySearch {
                            size: usize::MAX,
                            ..ActivitySearch::default()
                        };
                        manager.search_activities(&search).map(|page| page.items)
                    }
                };
                match result {
                    Ok(views) => print!("{}", render_activities(&views)),
                    Err(e) => print_error(&e),
                }
            }
            "complete" => {
                let id = parts.next().map(str::parse::<i64>);
                let notes: Vec<&str> = parts.collect();
                match id {
                    Some(Ok(id)) => {
                        let notes = (!notes.is_empty()).then(|| notes.join(" "));
                        match manager.mark_activity_completed(id, notes) {
                            Ok(_) => println!("Activity {id} completed."),
                            Err(e) => print_error(&e),
                        }
                    }
                    Some(Err(_)) => println!("Invalid id"),
                    None => println!("Usage: complete <activity_id> [notes...]"),
                }
            }
            "save" => match parts.next() {
                Some(path) => match manager.snapshot() {
                    Ok(snapshot) => match save_snapshot_to_json(&snapshot, path) {
                        Ok(_) => println!("State saved to {path}."),
                        Err(e) => println!("Error saving state: {e}"),
                    },
                    Err(e) => print_error(&e),
                },
                None => println!("Usage: save <json_path>"),
            },
            "load" => match parts.next() {
                Some(path) => match load_snapshot_from_json(path).and_then(MemoryStore::from_snapshot) {
                    Ok(store) => {
                        let rules = manager.rules().clone();
                        manager = ScheduleManager::with_rules(store, rules);
                        println!("State loaded from {path}.");
                        match all_bookings(&manager) {
                            Ok(views) => print!("{}", render_bookings(&views)),
                            Err(e) => print_error(&e),
                        }
                    }
                    Err(e) => println!("Error loading state: {e}"),
                },
                None => println!("Usage: load <json_path>"),
            },
            _ => {
                println!("Unknown command. Type 'help'.");
            }
        }
    }
}
