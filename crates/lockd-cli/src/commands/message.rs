use chrono::Local;
use lockd_core::{Request, RuntimeSettings};

use super::open_engine;

/// Run one request from the message contract and print the response and
/// the events the engine produced.
pub fn run(json: &str, settings: &RuntimeSettings) -> Result<(), Box<dyn std::error::Error>> {
    let request: Request = serde_json::from_str(json)?;
    let mut engine = open_engine(settings)?;
    let (response, events) = engine.handle_request(request, Local::now());
    let out = serde_json::json!({
        "response": response,
        "events": events,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
