//! Tests de bout en bout des commandes export et geocode sur des fichiers CSV

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use sheetgeo::geocode::{HttpClient, HttpResponse, Sleeper};
use sheetgeo::GeocodeError;
use sheetgeo_cli::cli::{cmd_export, geocode_file, ExportArgs, GeocodeArgs, SheetArgs};
use sheetgeo_cli::{Config, GeocodeSettings, RunStatus};

const STATIONS: &str = "\
Station ID,Lon,Lat,Altitude (m)
GRE,5.7667,45.3667,384
LHR,-0.4543,51.47,
,2.35,48.85,35
ACC,0,5.6,61
";

const ADDRESSES: &str = "\
Name,Street,City
Mairie,11 bd Jean Pain,Grenoble
Gare,,
Musée,5 place Lavalette,Grenoble
";

const FOUND: &str = r#"[{"lon": "5.7245", "lat": "45.1885", "importance": 0.62}]"#;

/// Répertoire de travail propre à un test
fn work_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sheetgeo-cli-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn sheet_args(input: &Path) -> SheetArgs {
    SheetArgs {
        input: input.to_path_buf(),
        range: None,
        header_row: 1,
        delimiter: ',',
        encoding: "windows-1252".into(),
        config: None,
        report: None,
    }
}

#[derive(Clone, Default)]
struct FakeClient {
    calls: Arc<Mutex<Vec<String>>>,
    failing: bool,
}

#[async_trait]
impl HttpClient for FakeClient {
    async fn get(&self, url: &str) -> Result<HttpResponse, GeocodeError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.failing {
            Ok(HttpResponse::new(503, "busy"))
        } else {
            Ok(HttpResponse::new(200, FOUND))
        }
    }
}

#[derive(Clone, Default)]
struct NoSleep;

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, _duration: Duration) {}
}

#[test]
fn test_export_command_writes_geojson() {
    let dir = work_dir("export");
    let input = dir.join("Weather Stations.csv");
    std::fs::write(&input, STATIONS).unwrap();

    let mut sheet = sheet_args(&input);
    sheet.report = Some(dir.join("report.json"));
    let args = ExportArgs {
        sheet,
        output: dir.join("out"),
        id: Some("Station ID".into()),
        lon: Some("Lon".into()),
        lat: Some("Lat".into()),
        name: None,
    };

    let report = cmd_export(&args).unwrap();
    assert_eq!(report.rows, 4);
    assert_eq!(report.features, 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.status, RunStatus::PartialSuccess);

    let saved = report.output.clone().unwrap();
    let filename = saved.path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(filename.starts_with("weatherStations-"), "{filename}");
    assert!(filename.ends_with(".geojson"));
    assert!(saved.url.starts_with("file://"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&saved.path).unwrap()).unwrap();
    assert_eq!(json["type"], "FeatureCollection");
    assert_eq!(json["features"][0]["id"], "GRE");
    assert_eq!(json["features"][1]["geometry"]["coordinates"][0], -0.4543);
    assert_eq!(json["features"][0]["properties"]["altitudeM"], "384");
    assert!(json["features"][1]["properties"].get("altitudeM").is_none());

    assert!(dir.join("report.json").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_export_command_with_config_mapping() {
    let dir = work_dir("export-config");
    let input = dir.join("stations.csv");
    std::fs::write(&input, STATIONS).unwrap();
    let config = dir.join("config.json");
    std::fs::write(
        &config,
        r#"{"mapping": {"id": "Station ID", "lon": "Lon", "lat": "Lat"}}"#,
    )
    .unwrap();

    let mut sheet = sheet_args(&input);
    sheet.config = Some(config);
    sheet.range = Some("A1:C2".into());
    let args = ExportArgs {
        sheet,
        output: dir.clone(),
        id: None,
        lon: None,
        lat: None,
        name: Some("".into()),
    };

    let report = cmd_export(&args).unwrap();
    assert_eq!(report.rows, 1);
    assert_eq!(report.features, 1);
    assert_eq!(report.status, RunStatus::Success);

    let saved = report.output.unwrap();
    let filename = saved.path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(filename.starts_with("unsaved-"), "{filename}");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_export_command_skips_title_row() {
    let dir = work_dir("export-title");
    let input = dir.join("stations.csv");
    std::fs::write(&input, "Weather stations,,\nStation ID,Lon,Lat\nGRE,5.7,45.3\n").unwrap();

    let mut sheet = sheet_args(&input);
    sheet.header_row = 2;
    let args = ExportArgs {
        sheet,
        output: dir.clone(),
        id: Some("Station ID".into()),
        lon: Some("Lon".into()),
        lat: Some("Lat".into()),
        name: None,
    };

    let report = cmd_export(&args).unwrap();
    assert_eq!(report.rows, 1);
    assert_eq!(report.features, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.status, RunStatus::Success);

    let saved = report.output.unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&saved.path).unwrap()).unwrap();
    assert_eq!(json["features"][0]["id"], "GRE");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_export_command_missing_mapping() {
    let dir = work_dir("export-missing");
    let input = dir.join("stations.csv");
    std::fs::write(&input, STATIONS).unwrap();

    let args = ExportArgs {
        sheet: sheet_args(&input),
        output: dir.clone(),
        id: Some("Station ID".into()),
        lon: None,
        lat: None,
        name: None,
    };
    assert!(cmd_export(&args).is_err());
    let _ = std::fs::remove_dir_all(&dir);
}

fn geocode_args(input: &Path, output: &Path) -> GeocodeArgs {
    GeocodeArgs {
        sheet: sheet_args(input),
        address: vec!["Street".into(), "City".into()],
        output: Some(output.to_path_buf()),
        provider: None,
        api_key: None,
        max_attempts: None,
        backoff: None,
        timeout: None,
    }
}

#[tokio::test]
async fn test_geocode_file_then_rerun() {
    let dir = work_dir("geocode");
    let input = dir.join("addresses.csv");
    let output = dir.join("geocoded.csv");
    std::fs::write(&input, ADDRESSES).unwrap();

    let settings = GeocodeSettings::default();
    let client = FakeClient::default();
    let args = geocode_args(&input, &output);

    let report = geocode_file(&args, &Config::default(), &settings, client.clone(), NoSleep)
        .await
        .unwrap();
    assert_eq!(report.provider, "nominatim");
    assert_eq!(report.written, 2);
    assert_eq!(report.no_address, 1);
    assert_eq!(report.columns_created, 3);
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(client.calls.lock().unwrap().len(), 2);

    let written = std::fs::read_to_string(&output).unwrap();
    let mut lines = written.lines();
    assert_eq!(
        lines.next(),
        Some("Name,Street,City,geo_longitude,geo_latitude,geo_accuracy")
    );
    assert_eq!(
        lines.next(),
        Some("Mairie,11 bd Jean Pain,Grenoble,5.7245,45.1885,0.62")
    );

    // Relance sur le fichier produit: aucune nouvelle requête
    let rerun = geocode_args(&output, &output);
    let report = geocode_file(&rerun, &Config::default(), &settings, client.clone(), NoSleep)
        .await
        .unwrap();
    assert_eq!(report.skipped, 2);
    assert_eq!(report.written, 0);
    assert_eq!(report.columns_created, 0);
    assert_eq!(client.calls.lock().unwrap().len(), 2);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_geocode_file_failures_stay_retryable() {
    let dir = work_dir("geocode-failing");
    let input = dir.join("addresses.csv");
    std::fs::write(&input, ADDRESSES).unwrap();

    let settings = GeocodeSettings {
        max_attempts: 2,
        backoff_secs: vec![1],
        ..Default::default()
    };
    let client = FakeClient {
        failing: true,
        ..Default::default()
    };
    let mut args = geocode_args(&input, &input);
    args.output = None;

    let report = geocode_file(&args, &Config::default(), &settings, client.clone(), NoSleep)
        .await
        .unwrap();
    assert_eq!(report.failed, 2);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(client.calls.lock().unwrap().len(), 4);

    // Colonnes créées dans le fichier d'entrée, valeurs vides
    let written = std::fs::read_to_string(&input).unwrap();
    let second = written.lines().nth(1).unwrap();
    assert_eq!(second, "Mairie,11 bd Jean Pain,Grenoble,,,");

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_geocode_file_configuration_errors() {
    let dir = work_dir("geocode-config");
    let input = dir.join("addresses.csv");
    std::fs::write(&input, ADDRESSES).unwrap();
    let client = FakeClient::default();

    let unknown = GeocodeSettings {
        provider: "bing".into(),
        ..Default::default()
    };
    let args = geocode_args(&input, &input);
    assert!(
        geocode_file(&args, &Config::default(), &unknown, client.clone(), NoSleep)
            .await
            .is_err()
    );

    let keyless = GeocodeSettings {
        provider: "mapbox".into(),
        ..Default::default()
    };
    assert!(
        geocode_file(&args, &Config::default(), &keyless, client.clone(), NoSleep)
            .await
            .is_err()
    );

    let mut no_address = geocode_args(&input, &input);
    no_address.address.clear();
    assert!(geocode_file(
        &no_address,
        &Config::default(),
        &GeocodeSettings::default(),
        client.clone(),
        NoSleep
    )
    .await
    .is_err());

    assert!(client.calls.lock().unwrap().is_empty());
    assert_eq!(std::fs::read_to_string(&input).unwrap(), ADDRESSES);
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_geocode_file_leaves_title_row_alone() {
    let dir = work_dir("geocode-title");
    let input = dir.join("addresses.csv");
    std::fs::write(
        &input,
        ",My address book,\nName,Street,City\nMairie,11 bd Jean Pain,Grenoble\n",
    )
    .unwrap();

    let client = FakeClient::default();
    let mut args = geocode_args(&input, &input);
    args.sheet.header_row = 2;

    let report = geocode_file(
        &args,
        &Config::default(),
        &GeocodeSettings::default(),
        client.clone(),
        NoSleep,
    )
    .await
    .unwrap();
    assert_eq!(report.written, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(client.calls.lock().unwrap().len(), 1);

    let written = std::fs::read_to_string(&input).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(
        lines,
        vec![
            ",My address book,,,,",
            "Name,Street,City,geo_longitude,geo_latitude,geo_accuracy",
            "Mairie,11 bd Jean Pain,Grenoble,5.7245,45.1885,0.62",
        ]
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_geocode_file_keeps_windows_1252_encoding() {
    let dir = work_dir("geocode-cp1252");
    let input = dir.join("addresses.csv");
    // "Musée" en windows-1252
    std::fs::write(
        &input,
        b"Name,Street,City\nMus\xE9e,5 place Lavalette,Grenoble\n",
    )
    .unwrap();

    let client = FakeClient::default();
    let mut args = geocode_args(&input, &input);
    args.output = None;

    let report = geocode_file(
        &args,
        &Config::default(),
        &GeocodeSettings::default(),
        client.clone(),
        NoSleep,
    )
    .await
    .unwrap();
    assert_eq!(report.written, 1);

    let bytes = std::fs::read(&input).unwrap();
    assert!(bytes.windows(5).any(|w| w == b"Mus\xE9e"));
    assert!(!bytes.windows(2).any(|w| w == b"\xC3\xA9"));
    assert!(std::str::from_utf8(&bytes).is_err());

    let _ = std::fs::remove_dir_all(&dir);
}
