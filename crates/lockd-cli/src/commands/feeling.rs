use clap::Subcommand;
use lockd_core::{Feeling, Request, Response, RuntimeSettings};

use super::{open_engine, request};

#[derive(Subcommand)]
pub enum FeelingAction {
    /// Record how a visit felt
    Log {
        domain: String,
        /// positive, neutral or negative
        feeling: String,
        /// Minutes spent
        #[arg(long, default_value = "0")]
        minutes: u32,
    },
    /// Show the feelings log
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: FeelingAction, settings: &RuntimeSettings) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = open_engine(settings)?;

    match action {
        FeelingAction::Log {
            domain,
            feeling,
            minutes,
        } => {
            let feeling: Feeling = feeling.parse()?;
            request(
                &mut engine,
                Request::LogFeeling {
                    domain,
                    feeling,
                    duration_minutes: minutes,
                },
            )?;
            println!("ok");
        }
        FeelingAction::List { json } => {
            let Response::Feelings(entries) = request(&mut engine, Request::GetFeelings)? else {
                return Err("unexpected response".into());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }
            for entry in &entries {
                println!(
                    "{} {:<24} {:<8} {}m",
                    entry.at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"),
                    entry.domain,
                    entry.feeling.as_str(),
                    entry.duration_minutes
                );
            }
        }
    }
    Ok(())
}
