//! Définition et implémentation des commandes CLI
//!
//! - `export`: CSV -> GeoJSON (FeatureCollection de points)
//! - `geocode`: CSV -> CSV enrichi de colonnes longitude / latitude / précision

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use sheetgeo::geocode::{
    GeocodeRunner, GridGeocodeRequest, HttpClient, ProviderRegistry, ReqwestClient, Sleeper,
    TokioSleeper,
};
use sheetgeo::{export_collection, ColumnMapping, Grid, GridRange, HeaderKey};

use crate::config::{parse_backoff, Config, GeocodeSettings};
use crate::export::csv_grid::DEFAULT_ENCODING;
use crate::export::sink::unix_millis;
use crate::export::{output_filename, read_grid, write_grid, CsvOptions, DirectorySink, FileSink};
use crate::report::{ExportReport, GeocodeReport};

#[derive(Subcommand)]
pub enum Commands {
    /// Export a CSV sheet to a GeoJSON FeatureCollection
    Export(ExportArgs),

    /// Geocode the address columns of a CSV sheet
    Geocode(GeocodeArgs),
}

/// Options communes de lecture de la feuille
#[derive(Debug, Clone, Args)]
pub struct SheetArgs {
    /// Path to the CSV file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Range in A1 notation (e.g. A1:F200). Default: every row below the header row
    #[arg(long)]
    pub range: Option<String>,

    /// Row holding the column headers (1-based)
    #[arg(long, default_value_t = 1)]
    pub header_row: usize,

    /// CSV field delimiter
    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    /// Encoding used when the file is not valid UTF-8
    #[arg(long, default_value = DEFAULT_ENCODING)]
    pub encoding: String,

    /// JSON config file (column mapping, geocoder, output labels)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Save the run report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl SheetArgs {
    pub fn csv_options(&self) -> Result<CsvOptions> {
        if !self.delimiter.is_ascii() {
            anyhow::bail!("Delimiter must be an ASCII character, got '{}'", self.delimiter);
        }
        Ok(CsvOptions {
            delimiter: self.delimiter as u8,
            encoding: self.encoding.clone(),
        })
    }

    /// Ligne d'en-tête en index 0-based
    pub fn header_index(&self) -> Result<usize> {
        self.header_row
            .checked_sub(1)
            .context("Header row is 1-based, got 0")
    }

    /// Plage demandée, ou toutes les lignes sous l'en-tête
    pub fn resolve_range<G: Grid + ?Sized>(&self, grid: &G, header_row: usize) -> Result<GridRange> {
        match &self.range {
            Some(spec) => parse_a1_range(spec),
            None => Ok(grid.full_range().below_header(header_row)),
        }
    }

    /// Nom du document: nom du fichier sans extension
    pub fn document_name(&self) -> String {
        self.input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,

    /// Output directory for the GeoJSON file
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Column holding the unique id
    #[arg(long)]
    pub id: Option<String>,

    /// Column holding the longitude
    #[arg(long)]
    pub lon: Option<String>,

    /// Column holding the latitude
    #[arg(long)]
    pub lat: Option<String>,

    /// Document name used for the output file name (default: input file name)
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct GeocodeArgs {
    #[command(flatten)]
    pub sheet: SheetArgs,

    /// Address column, repeat in concatenation order (e.g. -a Street -a City)
    #[arg(short, long = "address")]
    pub address: Vec<String>,

    /// Output CSV (default: overwrite the input file)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Geocoding provider: mapbox, google, mapquest, nominatim (défaut : env GEOCODER_PROVIDER / nominatim)
    #[arg(long)]
    pub provider: Option<String>,

    /// Provider API key (défaut : env GEOCODER_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Attempts per address (défaut : env GEOCODER_MAX_ATTEMPTS / 5)
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Waits between attempts, in seconds (e.g. "2,2,5,10")
    #[arg(long)]
    pub backoff: Option<String>,

    /// HTTP timeout in seconds (défaut : env GEOCODER_TIMEOUT / 30)
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Exécute la commande export
pub fn cmd_export(args: &ExportArgs) -> Result<ExportReport> {
    let started_at = Instant::now();

    let config = Config::load_optional(args.sheet.config.as_deref())?;
    let mapping = resolve_mapping(args, &config)?;
    let options = args.sheet.csv_options()?;
    let header_row = args.sheet.header_index()?;

    let (grid, _) = read_grid(&args.sheet.input, &options)?;
    let range = args.sheet.resolve_range(&grid, header_row)?;

    let document = args
        .name
        .clone()
        .unwrap_or_else(|| args.sheet.document_name());

    info!(
        input = %args.sheet.input.display(),
        output = %args.output.display(),
        id = %mapping.id,
        lon = %mapping.lon,
        lat = %mapping.lat,
        "Starting export"
    );

    let mut report = ExportReport::new(&document);
    let outcome = export_collection(&grid, range, header_row, &mapping)?;
    report.record_outcome(&outcome);

    let json = outcome
        .collection
        .to_json_pretty()
        .context("Failed to serialize GeoJSON")?;
    let sink = DirectorySink::new(&args.output);
    let saved = sink.save(&output_filename(&document, unix_millis()), &json)?;
    report.set_output(saved);

    report.set_duration(started_at.elapsed());
    report.finalize();

    if let Some(path) = &args.sheet.report {
        report
            .save_to_file(path)
            .context(format!("Failed to save report: {}", path.display()))?;
    }

    Ok(report)
}

/// Exécute la commande geocode
pub async fn cmd_geocode(args: &GeocodeArgs) -> Result<GeocodeReport> {
    let config = Config::load_optional(args.sheet.config.as_deref())?;

    let mut settings = GeocodeSettings::from_env();
    settings.apply_file(&config.geocoder);
    apply_geocode_overrides(
        &mut settings,
        args.provider.clone(),
        args.api_key.clone(),
        args.max_attempts,
        args.backoff.as_deref(),
        args.timeout,
    )?;

    let client = ReqwestClient::new(settings.timeout, &settings.user_agent)?;
    geocode_file(args, &config, &settings, client, TokioSleeper).await
}

/// Géocode un fichier CSV avec un client HTTP et une attente donnés
pub async fn geocode_file<C: HttpClient, S: Sleeper>(
    args: &GeocodeArgs,
    config: &Config,
    settings: &GeocodeSettings,
    client: C,
    sleeper: S,
) -> Result<GeocodeReport> {
    let started_at = Instant::now();

    // Erreurs de configuration avant toute lecture ou requête
    let runner = GeocodeRunner::from_registry(
        &ProviderRegistry::with_defaults(),
        &settings.provider,
        settings.api_key.clone(),
        settings.retry_policy()?,
        client,
        sleeper,
    )?;

    let address_columns: Vec<HeaderKey> = if args.address.is_empty() {
        config.address_keys()
    } else {
        args.address.iter().map(|a| HeaderKey::new(a)).collect()
    };
    if address_columns.is_empty() {
        anyhow::bail!("No address column: use --address or `address_columns` in the config file");
    }

    let options = args.sheet.csv_options()?;
    let header_row = args.sheet.header_index()?;
    let (mut grid, encoding) = read_grid(&args.sheet.input, &options)?;
    let range = args.sheet.resolve_range(&grid, header_row)?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.sheet.input.clone());

    info!(
        input = %args.sheet.input.display(),
        output = %output.display(),
        provider = runner.provider_name(),
        max_attempts = runner.policy().max_attempts(),
        "Starting geocoding"
    );

    let request = GridGeocodeRequest {
        range,
        header_row,
        address_columns,
        labels: config.labels.clone(),
    };
    let result = runner.geocode_grid(&mut grid, &request).await;

    // Les lignes déjà écrites sont conservées même si le passage s'interrompt.
    // Le fichier est réécrit dans l'encodage d'origine.
    write_grid(&grid, &output, &options, encoding)?;
    let summary = result?;

    let mut report = GeocodeReport::new(&args.sheet.document_name(), runner.provider_name());
    report.record_summary(&summary);
    report.set_duration(started_at.elapsed());
    report.finalize();

    if let Some(path) = &args.sheet.report {
        report
            .save_to_file(path)
            .context(format!("Failed to save report: {}", path.display()))?;
    }

    Ok(report)
}

/// Mapping des colonnes: options CLI, sinon fichier de configuration
fn resolve_mapping(args: &ExportArgs, config: &Config) -> Result<ColumnMapping> {
    let from_config = config.mapping.as_ref();
    let pick = |cli: &Option<String>, cfg: Option<&HeaderKey>, flag: &str| -> Result<HeaderKey> {
        match (cli, cfg) {
            (Some(raw), _) => Ok(HeaderKey::new(raw)),
            (None, Some(key)) => Ok(key.clone()),
            (None, None) => anyhow::bail!(
                "Missing column mapping for {}: use --{} or `mapping` in the config file",
                flag,
                flag
            ),
        }
    };

    Ok(ColumnMapping {
        id: pick(&args.id, from_config.map(|m| &m.id), "id")?,
        lon: pick(&args.lon, from_config.map(|m| &m.lon), "lon")?,
        lat: pick(&args.lat, from_config.map(|m| &m.lat), "lat")?,
    })
}

/// Surcharge les paramètres par les options de la ligne de commande
pub fn apply_geocode_overrides(
    settings: &mut GeocodeSettings,
    provider: Option<String>,
    api_key: Option<String>,
    max_attempts: Option<u32>,
    backoff: Option<&str>,
    timeout: Option<u64>,
) -> Result<()> {
    if let Some(provider) = provider {
        settings.provider = provider;
    }
    if let Some(api_key) = api_key {
        settings.api_key = api_key;
    }
    if let Some(max_attempts) = max_attempts {
        settings.max_attempts = max_attempts;
    }
    if let Some(backoff) = backoff {
        settings.backoff_secs = parse_backoff(backoff)
            .context(format!("Invalid --backoff: '{}'. Expected e.g. 2,2,5,10", backoff))?;
    }
    if let Some(timeout) = timeout {
        settings.timeout = std::time::Duration::from_secs(timeout);
    }
    Ok(())
}

/// Parse une plage en notation A1 ("B2:D10", ou une seule cellule "C3")
pub fn parse_a1_range(spec: &str) -> Result<GridRange> {
    let (start, end) = spec.split_once(':').unwrap_or((spec, spec));
    let (first_row, first_col) = parse_a1_cell(start)?;
    let (last_row, last_col) = parse_a1_cell(end)?;

    if last_row < first_row || last_col < first_col {
        anyhow::bail!("Invalid range '{}': end is before start", spec);
    }

    Ok(GridRange::new(
        first_row,
        first_col,
        last_row - first_row + 1,
        last_col - first_col + 1,
    ))
}

/// "AB12" -> (11, 27), indices 0-based
fn parse_a1_cell(cell: &str) -> Result<(usize, usize)> {
    let cell = cell.trim();
    let split = cell
        .find(|c: char| c.is_ascii_digit())
        .context(format!("Invalid cell reference '{}': missing row", cell))?;
    let (letters, digits) = cell.split_at(split);

    // XFD est la dernière colonne d'un tableur
    if letters.is_empty() || letters.len() > 3 || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        anyhow::bail!("Invalid cell reference '{}': bad column", cell);
    }

    let col = letters
        .bytes()
        .fold(0usize, |acc, b| acc * 26 + (b.to_ascii_uppercase() - b'A') as usize + 1)
        - 1;
    let row: usize = digits
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid cell reference '{}': bad row", cell))?;
    if row == 0 {
        anyhow::bail!("Invalid cell reference '{}': rows start at 1", cell);
    }

    Ok((row - 1, col))
}
