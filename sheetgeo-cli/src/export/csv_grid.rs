//! Lecture et écriture de fichiers CSV sous forme de grille

use std::path::Path;

use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8};
use tracing::{debug, info, warn};

use sheetgeo::{CellValue, MemoryGrid};

/// Encodage supposé des fichiers qui ne sont pas en UTF-8 (exports Excel)
pub const DEFAULT_ENCODING: &str = "windows-1252";

/// Options de lecture/écriture CSV
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,

    /// Label d'encodage (WHATWG) utilisé si le contenu n'est pas du UTF-8 valide
    pub encoding: String,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            encoding: DEFAULT_ENCODING.into(),
        }
    }
}

/// Décode un contenu brut: UTF-8 si valide, sinon l'encodage indiqué.
/// Retourne aussi l'encodage retenu, pour réécrire le fichier à l'identique.
pub fn decode(bytes: &[u8], encoding_label: &str) -> Result<(String, &'static Encoding)> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    if let Ok(text) = simdutf8::basic::from_utf8(bytes) {
        return Ok((text.to_string(), UTF_8));
    }

    let encoding = Encoding::for_label(encoding_label.as_bytes())
        .context(format!("Unknown encoding label: {}", encoding_label))?;
    let (text, _, had_errors) = encoding.decode(bytes);
    debug!(
        encoding = encoding.name(),
        had_errors, "Input is not UTF-8, decoded with fallback encoding"
    );

    Ok((text.into_owned(), encoding))
}

/// Encode un texte pour l'écriture; les caractères sans équivalent sont signalés
pub fn encode(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    let (bytes, used, had_errors) = encoding.encode(text);
    if had_errors || used != encoding {
        warn!(
            encoding = encoding.name(),
            written = used.name(),
            "Some characters cannot be represented in the input encoding"
        );
    }
    bytes.into_owned()
}

/// Construit une grille depuis un texte CSV (sans ligne d'en-tête implicite)
pub fn parse_grid(text: &str, delimiter: u8) -> Result<MemoryGrid> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.context(format!("Invalid CSV record at line {}", i + 1))?;
        rows.push(record.iter().map(to_cell).collect::<Vec<_>>());
    }

    Ok(MemoryGrid::new(rows))
}

/// Lit un fichier CSV; retourne la grille et l'encodage détecté
pub fn read_grid(path: &Path, options: &CsvOptions) -> Result<(MemoryGrid, &'static Encoding)> {
    let bytes =
        std::fs::read(path).context(format!("Failed to read CSV file: {}", path.display()))?;
    let (text, encoding) = decode(&bytes, &options.encoding)?;
    let grid = parse_grid(&text, options.delimiter)?;

    info!(
        path = %path.display(),
        rows = grid.rows().len(),
        encoding = encoding.name(),
        "Loaded CSV grid"
    );

    Ok((grid, encoding))
}

/// Sérialise une grille en texte CSV
pub fn to_csv_string(grid: &MemoryGrid, delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    for row in grid.rows() {
        writer.write_record(row.iter().map(CellValue::to_text))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e))?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// Écrit une grille dans un fichier CSV, dans l'encodage donné
pub fn write_grid(
    grid: &MemoryGrid,
    path: &Path,
    options: &CsvOptions,
    encoding: &'static Encoding,
) -> Result<()> {
    let content = to_csv_string(grid, options.delimiter)?;
    std::fs::write(path, encode(&content, encoding))
        .context(format!("Failed to write CSV file: {}", path.display()))?;
    info!(path = %path.display(), encoding = encoding.name(), "Saved CSV grid");
    Ok(())
}

fn to_cell(raw: &str) -> CellValue {
    if raw.is_empty() {
        CellValue::Empty
    } else {
        CellValue::Text(raw.to_string())
    }
}
