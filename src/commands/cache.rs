use super::{GlobalArgs, Session};
use crate::{log_info, styles};
use anyhow::Result;
use clap::Subcommand;
use tabled::{builder::Builder, settings::Style};

#[derive(clap::Args, Debug)]
pub struct Args {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Remove every cached analysis result
    Clear,
    /// List cached results
    Show {
        #[arg(long, help = "Output in JSON format")]
        json: bool,
    },
}

pub fn run(global: &GlobalArgs, args: Args) -> Result<i32> {
    let session = Session::open(global)?;

    match args.action {
        Action::Clear => {
            let count = session.cache.len();
            session.cache.clear();
            session.cache.save()?;
            log_info!("Removed {count} cached result(s)");
        }
        Action::Show { json } => {
            let entries = session.cache.snapshot();
            if json {
                let map: serde_json::Map<String, serde_json::Value> = entries
                    .into_iter()
                    .map(|(name, entry)| serde_json::to_value(entry).map(|value| (name, value)))
                    .collect::<Result<_, serde_json::Error>>()?;
                println!("{}", serde_json::to_string_pretty(&map)?);
                return Ok(0);
            }
            if entries.is_empty() {
                log_info!("Cache is empty");
                return Ok(0);
            }
            let use_color = styles::colors_enabled();
            let mut builder = Builder::new();
            builder.push_record(["Branch", "Commit", "Status", "Sync", "Computed"].map(String::from));
            for (name, entry) in &entries {
                builder.push_record([
                    name.clone(),
                    entry.sha.chars().take(7).collect(),
                    styles::status(entry.status, use_color),
                    styles::sync(&entry.sync_status, use_color),
                    entry.computed_at.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }
            let mut table = builder.build();
            table.with(Style::blank());
            println!("{table}");
        }
    }
    Ok(0)
}
