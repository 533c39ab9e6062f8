mod browser;
mod config;
mod extract;
mod input;
mod job;
mod loader;
mod model;
mod pipeline;
mod server;
mod store;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use config::{Settings, SettingsArgs};
use store::{export, JsonFileStore};

#[derive(Parser)]
#[command(name = "maps_scraper", about = "Business contacts scraper for map search results")]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every search in the input list
    Run,
    /// Write a search list for one category and scrape it
    Search {
        /// Business category, e.g. "Padaria"
        #[arg(short, long)]
        category: String,
        /// Location to search in (repeatable)
        #[arg(short, long = "location", required = true)]
        locations: Vec<String>,
    },
    /// Serve the web UI
    Serve {
        #[arg(long, default_value = "127.0.0.1:5000")]
        bind: SocketAddr,
    },
    /// Export contacts to CSV
    Export {
        /// Destination (default: next to the contacts file)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Contacts overview table
    Show {
        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::from_args(&cli.settings);

    let result = match cli.command {
        Commands::Run => {
            let stats = job::run_job(&settings).await?;
            stats.print();
            Ok(())
        }
        Commands::Search { category, locations } => {
            let outcome = job::start(&category, &locations, &settings).await;
            println!("{}", outcome.message);
            if outcome.ok() {
                Ok(())
            } else {
                Err(anyhow::anyhow!("search did not complete"))
            }
        }
        Commands::Serve { bind } => server::serve(settings, bind).await,
        Commands::Export { out } => {
            let store = JsonFileStore::new(&settings.output);
            let records = store.load();
            if records.is_empty() {
                println!("No contacts in {}. Run 'run' or 'search' first.", store.path().display());
                return Ok(());
            }
            let path = out.unwrap_or_else(|| settings.csv_path());
            export::write_csv(&records, &path)?;
            println!("Exported {} contacts to {}", records.len(), path.display());
            Ok(())
        }
        Commands::Show { category, limit } => {
            let records = JsonFileStore::new(&settings.output).load();
            let rows: Vec<_> = records
                .iter()
                .filter(|r| category.as_deref().map_or(true, |c| r.category.eq_ignore_ascii_case(c)))
                .take(limit)
                .collect();
            if rows.is_empty() {
                println!("No contacts found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<28} | {:<16} | {:<18} | {:<36}",
                "#", "Name", "Phone", "Category", "Address"
            );
            println!("{}", "-".repeat(112));
            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<28} | {:<16} | {:<18} | {:<36}",
                    i + 1,
                    truncate(&r.name, 28),
                    r.phone,
                    truncate(&r.category, 18),
                    truncate(&r.address, 36),
                );
            }
            println!("\n{} of {} contacts", rows.len(), records.len());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_width() {
        assert_eq!(truncate("Padaria", 10), "Padaria");
        assert_eq!(truncate("Padaria Pão Quente", 10), "Padaria...");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(std::time::Duration::from_secs(75)), "1m 15s");
        assert_eq!(format_duration(std::time::Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn cli_parses_repeated_locations() {
        let cli = Cli::try_parse_from([
            "maps_scraper", "search", "-c", "Padaria", "-l", "Curitiba", "-l", "Ivaí",
        ])
        .unwrap();
        match cli.command {
            Commands::Search { category, locations } => {
                assert_eq!(category, "Padaria");
                assert_eq!(locations, ["Curitiba", "Ivaí"]);
            }
            _ => panic!("expected search"),
        }
    }
}
