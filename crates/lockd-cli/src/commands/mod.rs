pub mod config;
pub mod feeling;
pub mod message;
pub mod pass;
pub mod ration;
pub mod serve;
pub mod site;

use chrono::Local;
use lockd_core::storage::Database;
use lockd_core::{GovernorEngine, Request, Response, RuntimeSettings};

pub fn open_engine(
    settings: &RuntimeSettings,
) -> Result<GovernorEngine<Database>, Box<dyn std::error::Error>> {
    let db = Database::open_at(&settings.database_path()?)?;
    Ok(GovernorEngine::new(db))
}

/// Run one request and turn `{"error": ...}` into `Err`.
///
/// Alarm commands in the returned events are dropped: a running host
/// re-arms its timers from storage on its next startup event.
pub fn request(
    engine: &mut GovernorEngine<Database>,
    request: Request,
) -> Result<Response, Box<dyn std::error::Error>> {
    let (response, _events) = engine.handle_request(request, Local::now());
    match response {
        Response::Error { error } => Err(error.into()),
        other => Ok(other),
    }
}
