use clap::Subcommand;
use lockd_core::{GovernorConfig, Request, Response, RuntimeSettings};

use super::{open_engine, request};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "workDuration", "sites.0.blocked")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults
    Reset,
}

fn current(
    engine: &mut lockd_core::GovernorEngine<lockd_core::Database>,
) -> Result<GovernorConfig, Box<dyn std::error::Error>> {
    match request(engine, Request::GetConfig)? {
        Response::Config(config) => Ok(config),
        other => Err(format!("unexpected response: {other:?}").into()),
    }
}

pub fn run(action: ConfigAction, settings: &RuntimeSettings) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = open_engine(settings)?;

    match action {
        ConfigAction::Get { key } => {
            let config = current(&mut engine)?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => {
                    eprintln!("unknown key: {key}");
                    std::process::exit(1);
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = current(&mut engine)?;
            config.set(&key, &value)?;
            request(&mut engine, Request::SaveConfig { config })?;
            println!("ok");
        }
        ConfigAction::List => {
            let config = current(&mut engine)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Reset => {
            request(
                &mut engine,
                Request::SaveConfig {
                    config: GovernorConfig::default(),
                },
            )?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
