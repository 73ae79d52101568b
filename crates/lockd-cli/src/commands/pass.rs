use chrono::{Local, Utc};
use clap::Subcommand;
use lockd_core::{PassKind, Request, Response, RuntimeSettings};

use super::{open_engine, request};

#[derive(Subcommand)]
pub enum PassAction {
    /// Grant a timed pass
    Grant {
        /// Domain (or any hostname it governs)
        domain: String,
        /// Pass type: work or private
        #[arg(long = "type", default_value = "work")]
        kind: String,
        /// Duration in minutes (defaults to the configured work/private default)
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// List active passes
    List,
    /// Revoke a pass
    Revoke {
        /// Domain
        domain: String,
    },
    /// Revoke every pass
    RevokeAll,
}

pub fn run(action: PassAction, settings: &RuntimeSettings) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = open_engine(settings)?;

    match action {
        PassAction::Grant {
            domain,
            kind,
            minutes,
        } => {
            let kind: PassKind = kind.parse()?;
            engine.ensure_initialized(Local::now())?;
            let duration_minutes = minutes.unwrap_or(match kind {
                PassKind::Work => engine.config().work_duration,
                PassKind::Private => engine.config().private_duration_default,
            });
            request(
                &mut engine,
                Request::GrantPass {
                    domain: domain.clone(),
                    kind,
                    duration_minutes,
                },
            )?;
            println!("{} pass granted: {domain} ({duration_minutes}m)", kind.as_str());
        }
        PassAction::List => {
            let Response::Passes(passes) = request(&mut engine, Request::GetAllPasses)? else {
                return Err("unexpected response".into());
            };
            if passes.is_empty() {
                println!("no active passes");
            }
            let now = Utc::now();
            for (domain, pass) in &passes {
                println!(
                    "{:<24} {:<8} {}m left",
                    domain,
                    pass.kind.as_str(),
                    pass.remaining(now).num_minutes()
                );
            }
        }
        PassAction::Revoke { domain } => {
            request(&mut engine, Request::RevokePass { domain: domain.clone() })?;
            println!("pass revoked: {domain}");
        }
        PassAction::RevokeAll => {
            request(&mut engine, Request::RevokeAllPasses)?;
            println!("all passes revoked");
        }
    }
    Ok(())
}
