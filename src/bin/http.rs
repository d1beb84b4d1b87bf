#[cfg(feature = "http_api")]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use school_timetable::{
        MemoryStore, ScheduleManager, SchoolCalendar, SchoolStore, ServerConfig,
        http_api::{self, AppState},
        load_directory_from_json,
    };
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    let rules = config.load_rules()?;

    let mut store: Box<dyn SchoolStore> = match &config.database_path {
        #[cfg(feature = "sqlite")]
        Some(path) => Box::new(school_timetable::SqliteStore::new(path)?),
        #[cfg(not(feature = "sqlite"))]
        Some(path) => {
            tracing::warn!(path = %path.display(), "built without sqlite; using the in-memory store");
            Box::new(MemoryStore::new())
        }
        None => Box::new(MemoryStore::new()),
    };
    if let Some(path) = &config.directory_path {
        let directory = load_directory_from_json(path)?;
        store.load_directory(&directory)?;
        tracing::info!(
            classrooms = directory.classrooms.len(),
            subjects = directory.subjects.len(),
            teachers = directory.teachers.len(),
            "directory loaded"
        );
    }
    let calendar = match &config.calendar_path {
        Some(path) => SchoolCalendar::from_json_file(path)?,
        None => SchoolCalendar::default(),
    };

    let addr = config.addr;
    println!("school-timetable HTTP API listening on http://{addr}");
    let state = AppState::new(ScheduleManager::from_boxed(store, rules)).with_calendar(calendar);
    http_api::serve(addr, state).await?;
    Ok(())
}

#[cfg(not(feature = "http_api"))]
fn main() {
    eprintln!("Rebuild with the `http_api` feature to enable the HTTP server.");
}
