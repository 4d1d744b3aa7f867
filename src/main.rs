//! Thin CLI over the salesos library: ingest a CSV, classify meetings,
//! print aggregates. All output is JSON on stdout; logs go to stderr via
//! `RUST_LOG`.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use salesos::classifier::GeminiClient;
use salesos::services::clients::{ClientFilters, DateWindow};
use salesos::services::metrics::{self, StatusFilter};
use salesos::services::{classify, clients, meetings};
use salesos::{Config, SalesDb};

#[derive(Parser)]
#[command(name = "salesos", about = "Sales-meeting ingestion, classification, and analytics")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a CSV file of meeting records, classifying each new meeting.
    Ingest {
        /// Path to the CSV file (header row required).
        file: PathBuf,
    },
    /// Classify one or more meetings by id. Already-classified meetings are
    /// returned from the store without a new external call.
    Classify {
        /// Meeting ids; missing ids are skipped.
        ids: Vec<i64>,
    },
    /// Print one aggregate as JSON.
    Metrics {
        #[arg(value_enum)]
        name: MetricName,
        /// Status filter for use-case distribution: all, closed, open.
        #[arg(long, default_value = "all")]
        status: String,
    },
    /// List clients with their meetings and classifications.
    Clients {
        /// Only clients whose latest meeting is assigned to this seller.
        #[arg(long)]
        seller: Option<String>,
        /// Relative date window: 7d, 30d, 90d, or all.
        #[arg(long, default_value = "all")]
        window: String,
    },
    /// Paged listing of all meetings.
    Meetings {
        #[arg(long, default_value_t = 0)]
        skip: i64,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Paged listing of all classifications.
    Classifications {
        #[arg(long, default_value_t = 0)]
        skip: i64,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

#[derive(Serialize)]
struct Page<T: Serialize> {
    total: i64,
    items: Vec<T>,
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricName {
    Overview,
    Funnel,
    Conversions,
    UrgencyBudget,
    UseCases,
    Pains,
    AvailablePains,
    Objections,
    SellerConversion,
    Origins,
    Automatization,
    Sentiment,
    Competitors,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();
    let db = SalesDb::open_at(config.db_path.clone())?;

    match cli.command {
        Command::Ingest { file } => {
            let provider = gemini_from(&config)?;
            let reader = File::open(&file)?;
            let report = salesos::ingest::ingest(&db, &provider, &config.retry, reader)?;
            print_json(&report)
        }
        Command::Classify { ids } => {
            let provider = gemini_from(&config)?;
            let outcomes = classify::classify_many(&db, &provider, &config.retry, &ids)?;
            print_json(&outcomes)
        }
        Command::Metrics { name, status } => match name {
            MetricName::Overview => print_json(&metrics::overview(&db)?),
            MetricName::Funnel => print_json(&metrics::funnel(&db)?),
            MetricName::Conversions => print_json(&metrics::monthly_conversion(&db)?),
            MetricName::UrgencyBudget => print_json(&metrics::urgency_budget_heatmap(&db)?),
            MetricName::UseCases => {
                let status = StatusFilter::parse(&status)
                    .ok_or_else(|| format!("invalid status filter: {status}"))?;
                print_json(&metrics::use_case_distribution(&db, status)?)
            }
            MetricName::Pains => print_json(&metrics::pain_distribution(&db)?),
            MetricName::AvailablePains => print_json(&metrics::available_pains(&db)?),
            MetricName::Objections => print_json(&metrics::available_objections(&db)?),
            MetricName::SellerConversion => print_json(&metrics::seller_conversion(&db)?),
            MetricName::Origins => print_json(&metrics::origin_distribution(&db)?),
            MetricName::Automatization => print_json(&metrics::automatization_outcomes(&db)?),
            MetricName::Sentiment => print_json(&metrics::sentiment_conversion(&db)?),
            MetricName::Competitors => print_json(&metrics::competitor_win_rate(&db)?),
        },
        Command::Clients { seller, window } => {
            let window = DateWindow::parse(&window)
                .ok_or_else(|| format!("invalid window: {window} (use 7d/30d/90d/all)"))?;
            let filters = ClientFilters { seller, window };
            let (items, total) = clients::list_clients(&db, &filters)?;

            #[derive(Serialize)]
            struct Listing {
                total: usize,
                items: Vec<clients::ClientRecord>,
            }
            print_json(&Listing { total, items })
        }
        Command::Meetings { skip, limit } => {
            let (items, total) = meetings::list_meetings(&db, skip, limit)?;
            print_json(&Page { total, items })
        }
        Command::Classifications { skip, limit } => {
            let (items, total) = classify::list_classifications(&db, skip, limit)?;
            print_json(&Page { total, items })
        }
    }
}

fn gemini_from(config: &Config) -> Result<GeminiClient, Box<dyn std::error::Error>> {
    let api_key = config
        .api_key
        .clone()
        .ok_or("GEMINI_API_KEY is not set; classification needs an API key")?;
    Ok(GeminiClient::new(api_key, config.model.clone()))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
