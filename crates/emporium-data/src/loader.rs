//! Economy file loading: format detection (RON/JSON/TOML), file discovery,
//! deserialization, and validation.

use emporium_core::config::{ConfigError, EconomyConfig};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Base name of the economy file inside a data directory.
pub const ECONOMY_FILE: &str = "economy";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: &'static str, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// The file parsed but describes an unusable economy.
    #[error("invalid economy in {file}: {source}")]
    Invalid {
        file: PathBuf,
        #[source]
        source: ConfigError,
    },

    /// Rendering a config to text failed.
    #[error("could not render config as {format:?}: {detail}")]
    Render { format: Format, detail: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for format in [Format::Ron, Format::Toml, Format::Json] {
        let candidate = dir.join(format!("{base_name}.{}", format.extension()));
        if candidate.exists() {
            if let Some(ref existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Deserialize `content` in the given format. `file` is only used for errors.
pub fn parse_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    file: &Path,
) -> Result<T, DataLoadError> {
    let parse_err = |detail: String| DataLoadError::Parse {
        file: file.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    parse_str(&content, format, path)
}

// ===========================================================================
// Economy config
// ===========================================================================

/// Load and validate an economy file. Fields the file leaves out take their
/// built-in defaults.
pub fn load_economy_config(path: &Path) -> Result<EconomyConfig, DataLoadError> {
    let config: EconomyConfig = deserialize_file(path)?;
    config.validate().map_err(|source| DataLoadError::Invalid {
        file: path.to_path_buf(),
        source,
    })?;
    tracing::info!(
        target: "emporium::data",
        file = %path.display(),
        starting_coins = config.starting_coins,
        seed = config.seed,
        "economy config loaded"
    );
    Ok(config)
}

/// Load `economy.{ron,toml,json}` from a data directory.
pub fn load_economy_config_from_dir(dir: &Path) -> Result<EconomyConfig, DataLoadError> {
    let path = find_data_file(dir, ECONOMY_FILE)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: ECONOMY_FILE,
        dir: dir.to_path_buf(),
    })?;
    load_economy_config(&path)
}

/// Render a config as text, e.g. to write out a starting template.
pub fn render_economy_config(
    config: &EconomyConfig,
    format: Format,
) -> Result<String, DataLoadError> {
    let render_err = |detail: String| DataLoadError::Render { format, detail };
    match format {
        Format::Ron => ron::ser::to_string_pretty(config, ron::ser::PrettyConfig::default())
            .map_err(|e| render_err(e.to_string())),
        Format::Json => serde_json::to_string_pretty(config).map_err(|e| render_err(e.to_string())),
        Format::Toml => toml::to_string_pretty(config).map_err(|e| render_err(e.to_string())),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use emporium_core::agent::ShippingKind;
    use emporium_core::business::BusinessKind;
    use emporium_core::cost::UpgradePricing;
    use emporium_core::resource::Resource;
    use std::fs;

    /// Create a unique temporary directory for a test.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "emporium_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Clean up a test directory.
    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    // -----------------------------------------------------------------------
    // detect_format
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("economy.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("economy.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("economy.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_format_unsupported() {
        assert!(matches!(
            detect_format(Path::new("economy.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("economy")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // find_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn find_data_file_found_and_missing() {
        let dir = make_test_dir("find");
        assert_eq!(find_data_file(&dir, ECONOMY_FILE).unwrap(), None);

        fs::write(dir.join("economy.toml"), "").unwrap();
        assert_eq!(
            find_data_file(&dir, ECONOMY_FILE).unwrap(),
            Some(dir.join("economy.toml"))
        );

        cleanup(&dir);
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("conflict");
        fs::write(dir.join("economy.ron"), "()").unwrap();
        fs::write(dir.join("economy.json"), "{}").unwrap();

        assert!(matches!(
            find_data_file(&dir, ECONOMY_FILE),
            Err(DataLoadError::ConflictingFormats { .. })
        ));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // load_economy_config
    // -----------------------------------------------------------------------

    #[test]
    fn load_partial_toml_fills_defaults() {
        let dir = make_test_dir("toml");
        let path = dir.join("economy.toml");
        fs::write(
            &path,
            r#"
starting_coins = 20000
seed = 7
upgrade_pricing = "Simple"
market_position = [10.0, -4.0]

[schedule]
tick_ms = 250
retarget_ms = 10000
interpolate_ms = 250
"#,
        )
        .unwrap();

        let config = load_economy_config(&path).unwrap();
        assert_eq!(config.starting_coins, 20000);
        assert_eq!(config.seed, 7);
        assert_eq!(config.upgrade_pricing, UpgradePricing::Simple);
        assert_eq!(config.market_position, [10.0, -4.0]);
        assert_eq!(config.schedule.tick_ms, 250);
        assert_eq!(config.starter_agent, Some(ShippingKind::Cart));
        assert_eq!(config.business_spec(BusinessKind::Forest).base_cost, 100);

        cleanup(&dir);
    }

    #[test]
    fn load_json_with_base_values() {
        let dir = make_test_dir("json");
        let path = dir.join("economy.json");
        fs::write(&path, r#"{ "base_values": { "Wood": 3, "Ore": 5 } }"#).unwrap();

        let config = load_economy_config(&path).unwrap();
        assert_eq!(config.base_values.get(&Resource::Wood), Some(&3));
        assert_eq!(config.base_values.get(&Resource::Ore), Some(&5));
        assert_eq!(config.starting_coins, 2000);

        cleanup(&dir);
    }

    #[test]
    fn load_ron_with_business_override() {
        let dir = make_test_dir("ron");
        fs::write(
            dir.join("economy.ron"),
            r#"(
    starting_coins: 500,
    starter_agent: None,
    businesses: {
        Forest: (
            base_cost: 80,
            processing_time: 10.0,
            batch_size: 10,
            incoming_capacity: 50,
            outgoing_capacity: 10,
        ),
    },
)"#,
        )
        .unwrap();

        let config = load_economy_config_from_dir(&dir).unwrap();
        assert_eq!(config.starting_coins, 500);
        assert_eq!(config.starter_agent, None);
        let forest = config.business_spec(BusinessKind::Forest);
        assert_eq!(forest.base_cost, 80);
        assert_eq!(forest.outgoing_capacity, 10);
        // Kinds the file leaves out keep their defaults.
        assert_eq!(config.business_spec(BusinessKind::Mine).base_cost, 150);

        cleanup(&dir);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = make_test_dir("invalid");
        let path = dir.join("economy.json");
        fs::write(
            &path,
            r#"{ "schedule": { "tick_ms": 0, "retarget_ms": 15000, "interpolate_ms": 400 } }"#,
        )
        .unwrap();

        let err = load_economy_config(&path).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::Invalid {
                source: ConfigError::ZeroPeriod { .. },
                ..
            }
        ));

        cleanup(&dir);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = make_test_dir("malformed");
        let path = dir.join("economy.ron");
        fs::write(&path, "(starting_coins: \"lots\")").unwrap();

        assert!(matches!(
            load_economy_config(&path),
            Err(DataLoadError::Parse { .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn missing_economy_file() {
        let dir = make_test_dir("missing");
        assert!(matches!(
            load_economy_config_from_dir(&dir),
            Err(DataLoadError::MissingRequired { file: ECONOMY_FILE, .. })
        ));
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // render_economy_config
    // -----------------------------------------------------------------------

    #[test]
    fn rendered_template_loads_back() {
        let dir = make_test_dir("render");
        let config = EconomyConfig {
            starting_coins: 12345,
            ..EconomyConfig::default()
        };
        for format in [Format::Ron, Format::Json] {
            let text = render_economy_config(&config, format).unwrap();
            let path = dir.join(format!("{ECONOMY_FILE}.{}", format.extension()));
            fs::write(&path, text).unwrap();
            assert_eq!(load_economy_config(&path).unwrap(), config);
            fs::remove_file(&path).unwrap();
        }
        cleanup(&dir);
    }
}
