//! skycheck - airspace crossing analysis and flight-profile correction.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use skycheck_core::profile::BranchAction;
use skycheck_engine::analysis::{analyze_flight, crossings_to_json};
use skycheck_engine::corrector::correct_flight_path;
use skycheck_engine::elevation::OpenElevationClient;
use skycheck_engine::persistence::{self, airspaces};
use skycheck_engine::query::QueryEngine;
use skycheck_engine::{aixm, kml, CancelToken, Config, Error};

#[derive(Parser, Debug)]
#[command(name = "skycheck", version, about = "Airspace crossing analysis for planned flights")]
struct Cli {
    /// Airspace database path
    #[arg(long, global = true, default_value = "data/airspaces.db")]
    db: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract an AIXM 4.5 dataset into the airspace database
    Extract {
        /// AIXM XML file
        xml: PathBuf,
    },
    /// Analyze a KML flight path for airspace crossings
    Analyze {
        /// KML route or trace
        kml: PathBuf,
        /// Vertical corridor margin in feet
        #[arg(long)]
        corridor_height: Option<f64>,
        /// Lateral corridor margin in nautical miles
        #[arg(long)]
        corridor_width: Option<f64>,
        /// Write the machine-readable crossings list to this JSON file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Rewrite a KML flight profile with realistic climbs and descents
    Correct {
        /// KML route
        kml: PathBuf,
        /// Output KML (default: <input>_corrected.kml)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Climb rate in ft/min
        #[arg(long)]
        climb_rate: Option<f64>,
        /// Descent rate in ft/min
        #[arg(long)]
        descent_rate: Option<f64>,
        /// Ground speed in knots
        #[arg(long)]
        ground_speed: Option<f64>,
    },
    /// Search airspaces by name or code
    Search {
        keyword: String,
        #[arg(long)]
        case_sensitive: bool,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Print dataset statistics
    Stats,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("skycheck=info,skycheck_engine=info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(filter)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(exit_code(&err));
    }
}

/// Exit codes: 0 success, 2 invalid input, 3 dataset missing,
/// 4 extraction/IO error, 5 network failure.
fn exit_code(err: &Error) -> i32 {
    match err {
        Error::InputMalformed(_) | Error::InputUnsupported(_) => 2,
        Error::DatasetMissing(_) => 3,
        Error::DatasetIncomplete { .. } | Error::Internal(_) | Error::Cancelled => 4,
        Error::NetworkUnavailable(_) | Error::Timeout(_) => 5,
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = Config::from_env();

    match cli.command {
        Command::Extract { xml } => {
            let db = persistence::init_database(&cli.db, 4).await?;
            let summary = aixm::extract_file(db.pool(), &xml).await?;

            println!("Extraction finished:");
            println!("  Ase elements:  {}", summary.ase_elements);
            println!("  Abd elements:  {}", summary.abd_elements);
            println!("  airspaces:     {}", summary.airspaces_kept);
            println!("  borders:       {}", summary.borders);
            println!("  vertices:      {}", summary.vertices);
            if summary.airspaces_skipped > 0 {
                println!("  skipped:       {}", summary.airspaces_skipped);
                for reason in &summary.skipped {
                    println!("    - {reason}");
                }
            }
        }

        Command::Analyze {
            kml,
            corridor_height,
            corridor_width,
            output,
        } => {
            let db = persistence::db::open_database(&cli.db, 4).await?;
            let path = kml::parse_file(&kml)?;

            let mut params = config.corridor_params();
            if let Some(height) = corridor_height {
                params.height_ft = height;
            }
            if let Some(width) = corridor_width {
                params.width_nm = width;
            }

            let engine = QueryEngine::new(db, &config);
            let analysis = analyze_flight(&engine, &path, &params, &CancelToken::new()).await?;

            println!(
                "Flight: {} waypoint(s), {:.1} km, corridor ±{:.0} ft / ±{:.1} NM",
                analysis.flight.waypoints,
                analysis.flight.total_distance_km,
                params.height_ft,
                params.width_nm
            );
            println!();
            print!("{}", analysis.report.to_summary());

            let json = crossings_to_json(&analysis.crossings)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("\nCrossings written to {}", path.display());
                }
                None => println!("\n{json}"),
            }
        }

        Command::Correct {
            kml: kml_path,
            output,
            climb_rate,
            descent_rate,
            ground_speed,
        } => {
            let path = kml::parse_file(&kml_path)?;

            let mut params = config.profile_params();
            if let Some(rate) = climb_rate {
                params.climb_rate_ftpm = rate;
            }
            if let Some(rate) = descent_rate {
                params.descent_rate_ftpm = rate;
            }
            if let Some(speed) = ground_speed {
                params.ground_speed_kt = speed;
            }

            let oracle = OpenElevationClient::new(config.elevation_timeout_s);
            let profile = correct_flight_path(&path, &params, &oracle, &config).await?;

            print_branch_table(&profile.branches);
            if profile.elevation_estimated {
                println!("note: endpoint elevations estimated (oracle unavailable), ground assumed at 0 ft MSL");
            }

            let output = output.unwrap_or_else(|| corrected_name(&kml_path));
            let document_name = output
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "corrected".to_string());
            let kml_out = kml::write_corrected(&profile.path, &document_name)?;
            std::fs::write(&output, kml_out)?;
            println!("Corrected profile written to {}", output.display());
        }

        Command::Search {
            keyword,
            case_sensitive,
            limit,
        } => {
            let db = persistence::db::open_database(&cli.db, 4).await?;
            let results =
                airspaces::search_by_keyword(db.pool(), &keyword, case_sensitive, limit).await?;

            if results.is_empty() {
                println!("No airspace matches {keyword:?}");
            }
            for airspace in results {
                let (lo, hi) = airspace.altitude_band_ft();
                let ceiling = if hi.is_finite() {
                    format!("{hi:.0} ft")
                } else {
                    "UNL".to_string()
                };
                println!(
                    "{:<12} {:<8} {:<40} {:>8.0} ft - {}",
                    airspace.code_id,
                    airspace.code_type.as_str(),
                    airspace.name,
                    lo,
                    ceiling
                );
            }
        }

        Command::Stats => {
            let db = persistence::db::open_database(&cli.db, 4).await?;
            let stats = airspaces::get_statistics(db.pool()).await?;

            println!("Airspaces:          {}", stats.total_airspaces);
            println!(
                "With geometry:      {} ({:.1}%)",
                stats.with_geometry, stats.geometry_coverage_pct
            );
            println!("By type:");
            for (code_type, count) in &stats.by_type {
                println!("  {code_type:<10} {count}");
            }
        }
    }

    Ok(())
}

fn print_branch_table(branches: &[skycheck_core::BranchReport]) {
    println!(
        "{:<8} {:>10} {:<9} {:>9} {:>9}",
        "Branch", "Distance", "Action", "From", "To"
    );
    for branch in branches {
        let action = match branch.action {
            BranchAction::Climb => "CLIMB",
            BranchAction::Descent => "DESCENT",
            BranchAction::Level => "LEVEL",
        };
        let mut flags = String::new();
        if branch.unreachable {
            flags.push_str("  UNREACHABLE");
        }
        if branch.elevation_estimated {
            flags.push_str("  elevation_estimated");
        }
        println!(
            "{:<8} {:>7.1} NM {:<9} {:>6.0} ft {:>6.0} ft{}",
            branch.index, branch.distance_nm, action, branch.from_alt_ft, branch.to_alt_ft, flags
        );
    }
}

fn corrected_name(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "flight".to_string());
    input.with_file_name(format!("{stem}_corrected.kml"))
}
