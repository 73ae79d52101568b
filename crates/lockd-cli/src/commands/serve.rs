use std::time::Duration;

use lockd_core::RuntimeSettings;

use crate::bridge;

pub fn run(settings: &RuntimeSettings) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(bridge::server::run(settings.clone()));
    // A stdin read may still be parked on the blocking pool.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result.map_err(|e| -> Box<dyn std::error::Error> { e })
}
