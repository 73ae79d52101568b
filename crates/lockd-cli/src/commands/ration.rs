use clap::Subcommand;
use lockd_core::{Request, Response, RuntimeSettings};

use super::{open_engine, request};

#[derive(Subcommand)]
pub enum RationAction {
    /// Today's ration usage (one domain, or every rationed site)
    Status {
        domain: Option<String>,
    },
    /// Add overtime minutes for today
    Overtime {
        domain: String,
        /// Minutes to add
        minutes: u32,
    },
}

pub fn run(action: RationAction, settings: &RuntimeSettings) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = open_engine(settings)?;

    match action {
        RationAction::Status { domain } => {
            let response = request(&mut engine, Request::GetRationUsage { domain: domain.clone() })?;
            if let (Response::Ration(None), Some(domain)) = (&response, &domain) {
                return Err(format!("not a rationed site: {domain}").into());
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        RationAction::Overtime { domain, minutes } => {
            request(
                &mut engine,
                Request::GrantOvertime {
                    domain: domain.clone(),
                    minutes,
                },
            )?;
            let Response::Overtime { granted_minutes } = request(
                &mut engine,
                Request::GetOvertimeStatus {
                    domain: Some(domain.clone()),
                },
            )?
            else {
                return Err("unexpected response".into());
            };
            println!("overtime for {domain}: {granted_minutes}m today");
        }
    }
    Ok(())
}
