#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the health map ingest tool.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use health_map_cli_utils::IndicatifProgress;
use health_map_database::geography_db::{self, DuckDbDirectory};
use health_map_database::{datasets, open};
use health_map_geography::directory::GeoDirectory as _;
use health_map_geography::{reference, search};
use health_map_ingest::config::{CONFIG_ENV, DATA_DIR_ENV, IngestConfig};
use health_map_ingest::synthetic::{self, SyntheticSpec};
use health_map_ingest::upload::{UploadRequest, upload};
use health_map_ingest::{ingest_rows, parse_format, read_rows};
use health_map_ingest_models::DataSetId;
use health_map_percentile_models::AssignedRank;
use rand::SeedableRng as _;
use rand::rngs::StdRng;

#[derive(Parser)]
#[command(name = "health_map_ingest", about = "County health data ingestion tool")]
struct Cli {
    /// Config file (default: ./health_map.toml if present)
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,
    /// Data directory holding the database and reference files
    #[arg(long, global = true, env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,
    /// Database file (default: <data-dir>/health_map.duckdb)
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    /// Log at debug level unless `RUST_LOG` says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the state and county reference tables
    LoadGeography {
        /// States CSV (`FIPS,USPS,NAME`). Uses the built-in table if absent.
        #[arg(long)]
        states: Option<PathBuf>,
        /// Counties CSV (`STATE_FIPS,FIPS,STATE_USPS,NAME`)
        #[arg(long)]
        counties: Option<PathBuf>,
    },
    /// Resolve a CSV without storing anything and print the outcome
    Check {
        /// CSV file to check
        file: PathBuf,
        /// Upload format: NAME, 1FIPS, or 2FIPS
        #[arg(long)]
        format: Option<String>,
    },
    /// Resolve, rank, and store a CSV as a new dataset
    Upload {
        /// CSV file to upload
        file: PathBuf,
        /// Health indicator name (created if new)
        #[arg(long)]
        indicator: String,
        /// Year the data covers
        #[arg(long)]
        year: i32,
        /// Upload format: NAME, 1FIPS, or 2FIPS
        #[arg(long)]
        format: Option<String>,
        /// Where the data came from
        #[arg(long)]
        source: Option<String>,
    },
    /// Generate and store a dataset of normally distributed values
    Random {
        /// Health indicator name (created if new)
        #[arg(short, long, default_value = synthetic::DEFAULT_INDICATOR)]
        indicator: String,
        /// Year the data covers
        #[arg(short, long, default_value_t = synthetic::DEFAULT_YEAR)]
        year: i32,
        /// Use at most this many counties
        #[arg(short, long)]
        count: Option<usize>,
        /// Mean of the generated values
        #[arg(short, long, default_value_t = synthetic::DEFAULT_MEAN)]
        mean: f64,
        /// Standard deviation (default: mean / 5)
        #[arg(short, long)]
        sigma: Option<f64>,
        /// RNG seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List stored datasets
    Datasets,
    /// List health indicators
    Indicators,
    /// Show an indicator's dataset for one year
    Show {
        /// Health indicator name
        indicator: String,
        /// Dataset year
        year: i32,
    },
    /// List years an indicator has datasets for
    Years {
        /// Health indicator name
        indicator: String,
    },
    /// Show the most recently uploaded dataset of an indicator
    Latest {
        /// Health indicator name
        indicator: String,
    },
    /// Mark an indicator as important (shown on overview charts)
    Important {
        /// Health indicator name
        indicator: String,
        /// Clear the flag instead of setting it
        #[arg(long)]
        unset: bool,
    },
    /// Delete a dataset with its points and percentiles
    Delete {
        /// Dataset id
        id: i64,
    },
    /// Look up a dataset's percentile table
    Percentile {
        /// Dataset id
        id: i64,
        /// Print the boundary value for this rank
        #[arg(long, conflicts_with = "value")]
        rank: Option<f64>,
        /// Print the rank this value falls in
        #[arg(long)]
        value: Option<f64>,
    },
    /// Suggest counties (or states) matching a search query
    Search {
        /// Text to look for, e.g. "Mont" or "county va"
        query: String,
        /// Search state names instead of counties
        #[arg(long)]
        states: bool,
        /// Maximum number of suggestions
        #[arg(long, default_value_t = search::SUGGESTION_LIMIT)]
        limit: usize,
    },
    /// List counties by state code or by 5-digit FIPS codes
    Counties {
        /// Two-digit state FIPS code
        #[arg(long, conflicts_with = "fips")]
        state: Option<String>,
        /// Comma-separated 5-digit FIPS codes; unknown codes are skipped
        #[arg(long)]
        fips: Option<String>,
    },
}

#[allow(clippy::too_many_lines)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let multi = health_map_cli_utils::init_logger(if cli.verbose { "debug" } else { "info" });

    let mut config = IngestConfig::load(cli.config.as_deref())?;
    config.apply_data_dir_override(cli.data_dir);
    if cli.database.is_some() {
        config.database = cli.database;
    }

    let conn = open(&config.database_path())?;
    let start = Instant::now();

    match cli.command {
        Commands::LoadGeography { states, counties } => {
            let states = states.or_else(|| config.states_path());
            let counties = counties.unwrap_or_else(|| config.counties_path());
            let directory = reference::load_directory(states.as_deref(), &counties)?;
            let (states, counties) = geography_db::store_directory(&conn, &directory)?;
            log::info!("Loaded {states} states and {counties} counties");
        }
        Commands::Check { file, format } => {
            let format = format.as_deref().map_or(Ok(config.default_format), parse_format)?;
            let rows = read_rows(std::fs::File::open(&file)?, format)?;
            let progress = IndicatifProgress::rows_bar(&multi, "Resolving rows");
            let outcome = ingest_rows(
                &DuckDbDirectory::new(&conn),
                format,
                &rows,
                DataSetId(0),
                &progress,
            )?;
            let report = serde_json::json!({
                "resolved": outcome.resolved.len(),
                "unresolved": outcome.unresolved.to_map(),
                "mismatches": outcome.unresolved,
                "unparsableValues": outcome.unparsable_values,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Upload {
            file,
            indicator,
            year,
            format,
            source,
        } => {
            let format = format.as_deref().map_or(Ok(config.default_format), parse_format)?;
            let rows = read_rows(std::fs::File::open(&file)?, format)?;
            let progress = IndicatifProgress::rows_bar(&multi, "Resolving rows");
            let request = UploadRequest {
                indicator,
                year,
                source,
                format,
                resolution: config.resolution()?,
            };
            let report = upload(
                &conn,
                &DuckDbDirectory::new(&conn),
                &rows,
                &request,
                &progress,
            )?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Random {
            indicator,
            year,
            count,
            mean,
            sigma,
            seed,
        } => {
            let spec = SyntheticSpec {
                indicator,
                year,
                mean,
                sigma,
                count,
                resolution: config.resolution()?,
            };
            let mut rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
            let directory = DuckDbDirectory::new(&conn);
            let total = directory.all_counties()?.len();
            let progress = IndicatifProgress::steps_bar(
                &multi,
                "Storing points",
                spec.count.map_or(total, |c| c.min(total)) as u64,
            );
            let report =
                synthetic::store_synthetic(&conn, &directory, &spec, &mut rng, &progress)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Datasets => {
            let summaries = datasets::list_data_sets(&conn)?;
            println!(
                "{:<6} {:<30} {:<6} {:<8} {:<20} SOURCE",
                "ID", "INDICATOR", "YEAR", "POINTS", "UPLOADED"
            );
            println!("{}", "-".repeat(90));
            for s in &summaries {
                println!(
                    "{:<6} {:<30} {:<6} {:<8} {:<20} {}",
                    s.data_set.id,
                    s.indicator,
                    s.data_set.year,
                    s.point_count,
                    s.data_set.uploaded_at.format("%Y-%m-%d %H:%M"),
                    s.data_set.source.as_deref().unwrap_or("-")
                );
            }
        }
        Commands::Indicators => {
            for indicator in datasets::list_indicators(&conn)? {
                let marker = if indicator.important { "*" } else { " " };
                println!("{marker} {:<40} {}", indicator.name, indicator.slug);
            }
        }
        Commands::Show { indicator, year } => {
            match datasets::data_set_for_year(&conn, &indicator, year)? {
                Some(data_set) => println!("{}", serde_json::to_string_pretty(&data_set)?),
                None => return Err(format!("No {year} data set for indicator {indicator:?}").into()),
            }
        }
        Commands::Years { indicator } => {
            let years = datasets::years_for_indicator(&conn, &indicator)?;
            println!("{}", serde_json::to_string(&years)?);
        }
        Commands::Latest { indicator } => {
            match datasets::most_recent_for_indicator(&conn, &indicator)? {
                Some(data_set) => println!("{}", serde_json::to_string_pretty(&data_set)?),
                None => return Err(format!("No data sets for indicator {indicator:?}").into()),
            }
        }
        Commands::Important { indicator, unset } => {
            datasets::set_indicator_important(&conn, &indicator, !unset)?;
            log::info!("{indicator}: important = {}", !unset);
        }
        Commands::Delete { id } => {
            if !datasets::delete_data_set(&conn, DataSetId(id))? {
                return Err(format!("No data set with id {id}").into());
            }
        }
        Commands::Percentile { id, rank, value } => {
            let id = DataSetId(id);
            let table = datasets::percentiles_for(&conn, id)?;
            if table.is_empty() {
                return Err(format!("No percentiles stored for data set {id}").into());
            }
            if let Some(rank) = rank {
                let boundary = datasets::value_for_rank(&conn, id, AssignedRank::Ranked(rank))?
                    .ok_or_else(|| format!("Rank {rank} is not in the table"))?;
                println!("{boundary}");
            } else if let Some(value) = value {
                let assigned = health_map_percentile::rank_for_value(&table, value);
                println!("{}", serde_json::to_string(&assigned)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&table)?);
            }
        }
        Commands::Search {
            query,
            states,
            limit,
        } => {
            let directory = DuckDbDirectory::new(&conn);
            if states {
                let names: Vec<String> = search::search_states(&directory, &query, limit)?
                    .into_iter()
                    .map(|state| state.name)
                    .collect();
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else {
                let suggestions = search::search_counties(&directory, &query, limit)?;
                println!("{}", serde_json::to_string_pretty(&suggestions)?);
            }
        }
        Commands::Counties { state, fips } => {
            let directory = DuckDbDirectory::new(&conn);
            let counties = if let Some(code) = state {
                let state = directory
                    .find_state_by_code(&code)?
                    .ok_or_else(|| format!("Unknown state code {code:?}"))?;
                directory.counties_in_state(&state)?
            } else if let Some(list) = fips {
                let codes: Vec<&str> = list.split(',').collect();
                directory.counties_for_fips5_list(&codes)?
            } else {
                directory.all_counties()?
            };
            for county in &counties {
                println!("{}\t{}", county.fips5(), county.search_label());
            }
        }
    }

    log::debug!("Finished in {:.2?}", start.elapsed());

    Ok(())
}
