//! Point d'entrée CLI pour sheetgeo

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

use sheetgeo_cli::cli::{self, Commands};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

/// Exporter une feuille CSV en GeoJSON ou géocoder ses adresses
#[derive(Parser)]
#[command(name = "sheetgeo")]
#[command(author, version)]
#[command(about = "Exporter une feuille CSV en GeoJSON, ou géocoder ses adresses")]
#[command(long_about = "Convertit les lignes d'une feuille (CSV) en FeatureCollection GeoJSON de points.\n\nLa commande 'geocode' ajoute les colonnes geo_longitude / geo_latitude / geo_accuracy à partir des colonnes d'adresse, via Mapbox, Google, MapQuest ou Nominatim.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Export(args) => {
            info!(input = %args.sheet.input.display(), output = %args.output.display(), "Export vers GeoJSON");
            let report = cli::cmd_export(&args)?;
            if cli.quiet {
                println!("{}", report.summary());
            } else {
                report.display();
            }
        }
        Commands::Geocode(args) => {
            info!(input = %args.sheet.input.display(), "Géocodage");
            let report = cli::cmd_geocode(&args).await?;
            if cli.quiet {
                println!("{}", report.summary());
            } else {
                report.display();
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
