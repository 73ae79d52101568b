use chrono::Local;
use clap::{Subcommand, ValueEnum};
use lockd_core::policy::hostname_from_url;
use lockd_core::{GovernorConfig, MatchMode, Request, Response, RuntimeSettings, SitePolicy};

use super::{open_engine, request};

#[derive(Clone, Copy, ValueEnum)]
pub enum MatchArg {
    Exact,
    Base,
    Regex,
}

impl From<MatchArg> for MatchMode {
    fn from(arg: MatchArg) -> Self {
        match arg {
            MatchArg::Exact => MatchMode::Exact,
            MatchArg::Base => MatchMode::BaseDomain,
            MatchArg::Regex => MatchMode::Regex,
        }
    }
}

#[derive(Subcommand)]
pub enum SiteAction {
    /// List governed sites
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add or replace a governed site
    Add {
        /// Domain (or pattern with --match regex)
        domain: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Match mode
        #[arg(long = "match", value_enum, default_value = "base")]
        match_mode: MatchArg,
        /// Daily ration in minutes (enables ration mode)
        #[arg(long)]
        ration: Option<u32>,
        /// Block the site outright
        #[arg(long)]
        blocked: bool,
        /// Disallow work passes
        #[arg(long)]
        no_work: bool,
        /// Disallow private passes
        #[arg(long)]
        no_private: bool,
        /// Ask how the user feels after the ration runs out
        #[arg(long)]
        feelings: bool,
    },
    /// Stop governing a site
    Remove {
        /// Domain as configured
        domain: String,
    },
    /// Show the access decision for a hostname or URL
    Check {
        /// Hostname or http(s) URL
        target: String,
    },
}

fn mode_label(site: &SitePolicy) -> &'static str {
    if site.blocked {
        "blocked"
    } else if site.rationed {
        "ration"
    } else {
        "pass"
    }
}

fn load_config(
    engine: &mut lockd_core::GovernorEngine<lockd_core::Database>,
) -> Result<GovernorConfig, Box<dyn std::error::Error>> {
    match request(engine, Request::GetConfig)? {
        Response::Config(config) => Ok(config),
        other => Err(format!("unexpected response: {other:?}").into()),
    }
}

pub fn run(action: SiteAction, settings: &RuntimeSettings) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = open_engine(settings)?;

    match action {
        SiteAction::List { json } => {
            let config = load_config(&mut engine)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config.sites)?);
                return Ok(());
            }
            for site in &config.sites {
                let ration = if site.rationed {
                    format!(" {}m/day", site.ration_minutes)
                } else {
                    String::new()
                };
                println!(
                    "{:<24} {:<16} {:<7}{}",
                    site.domain,
                    site.label(),
                    mode_label(site),
                    ration
                );
            }
        }
        SiteAction::Add {
            domain,
            name,
            match_mode,
            ration,
            blocked,
            no_work,
            no_private,
            feelings,
        } => {
            let mut site = SitePolicy::new(domain.clone(), name.unwrap_or_default())
                .with_match(match_mode.into())
                .with_blocked(blocked)
                .with_feelings_prompt(feelings);
            if let Some(minutes) = ration {
                site = site.with_ration(minutes);
            }
            site.allow_work = !no_work;
            site.allow_private = !no_private;
            site.validate()?;

            let mut config = load_config(&mut engine)?;
            config.upsert_site(site);
            request(&mut engine, Request::SaveConfig { config })?;
            println!("site saved: {domain}");
        }
        SiteAction::Remove { domain } => {
            let mut config = load_config(&mut engine)?;
            if !config.remove_site(&domain) {
                return Err(format!("no governed site: {domain}").into());
            }
            request(&mut engine, Request::SaveConfig { config })?;
            println!("site removed: {domain}");
        }
        SiteAction::Check { target } => {
            let host = if target.contains("://") {
                hostname_from_url(&target).ok_or_else(|| format!("not an http(s) URL: {target}"))?
            } else {
                target
            };
            let check = engine.check_access(&host, Local::now());
            println!("{}", serde_json::to_string_pretty(&check)?);
        }
    }
    Ok(())
}
