//! Configuration management for mdstage.
//!
//! Parses `mdstage.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `preview.kroki_url` supports environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "mdstage.toml";

/// Default artifact directory relative to the config file.
const DEFAULT_OUTPUT_DIR: &str = "out";

/// Default Kroki request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the artifact output directory.
    pub output_dir: Option<PathBuf>,
    /// Override the Kroki URL for preview rendering.
    pub kroki_url: Option<String>,
    /// Override the code macro theme.
    pub code_theme: Option<String>,
    /// Override the drawio macro width.
    pub diagram_width: Option<u32>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output configuration (paths are relative strings from TOML).
    output: OutputConfigRaw,
    /// Conversion options.
    pub convert: ConvertConfig,
    /// Preview rendering configuration (optional section).
    /// When present, `kroki_url` is required.
    preview: Option<PreviewConfigRaw>,

    /// Resolved output configuration (set after loading).
    #[serde(skip)]
    pub output_resolved: OutputConfig,
    /// Resolved preview configuration (set after loading).
    #[serde(skip)]
    pub preview_resolved: PreviewConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw output configuration as parsed from TOML (paths as strings).
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct OutputConfigRaw {
    dir: Option<String>,
}

/// Resolved output configuration with absolute paths.
#[derive(Debug, Default)]
pub struct OutputConfig {
    /// Directory artifacts are written to.
    pub dir: PathBuf,
}

/// Conversion options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// `theme` parameter for emitted code macros.
    pub code_theme: String,
    /// `diagramWidth` parameter for emitted drawio macros.
    pub diagram_width: u32,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            code_theme: "midnight".to_owned(),
            diagram_width: 800,
        }
    }
}

/// Raw preview configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PreviewConfigRaw {
    kroki_url: Option<String>,
    timeout_secs: Option<u64>,
}

/// Resolved preview rendering configuration.
#[derive(Debug)]
pub struct PreviewConfig {
    /// Kroki server URL; previews are disabled when unset.
    pub kroki_url: Option<String>,
    /// Timeout for preview HTTP requests.
    pub timeout: Duration,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            kroki_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`preview.kroki_url`").
        field: String,
        /// Error message (e.g., "${`KROKI_URL`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a URL field to use http:// or https:// scheme.
fn require_http_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(())
}

/// Expand `${VAR}` and `${VAR:-default}` references in a config string.
///
/// Returns the original string unchanged if no `${}` patterns are present.
/// Bare `$VAR` syntax is not expanded (only `${VAR}` with braces).
fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    struct MissingVar {
        var_name: String,
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, MissingVar> {
        match std::env::var(var) {
            Ok(val) => Ok(Some(val)),
            Err(_) => Err(MissingVar {
                var_name: var.to_owned(),
            }),
        }
    })
    .map(|cow| cow.into_owned())
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{0}}} not set", e.cause.var_name),
    })
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `mdstage.toml` in current directory and
    /// parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing
    /// CLI arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing
    /// fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Kroki endpoint for previews, validated present.
    ///
    /// Use this when the command was asked to render previews.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` when no endpoint is configured.
    pub fn require_kroki_url(&self) -> Result<&str, ConfigError> {
        self.preview_resolved.kroki_url.as_deref().ok_or_else(|| {
            ConfigError::Validation(
                "previews require preview.kroki_url in config or --kroki-url".to_owned(),
            )
        })
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(output_dir) = &settings.output_dir {
            self.output_resolved.dir.clone_from(output_dir);
        }
        if let Some(kroki_url) = &settings.kroki_url {
            self.preview_resolved.kroki_url = Some(kroki_url.clone());
        }
        if let Some(code_theme) = &settings.code_theme {
            self.convert.code_theme.clone_from(code_theme);
        }
        if let Some(diagram_width) = settings.diagram_width {
            self.convert.diagram_width = diagram_width;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            output: OutputConfigRaw::default(),
            convert: ConvertConfig::default(),
            preview: None,
            output_resolved: OutputConfig {
                dir: base.join(DEFAULT_OUTPUT_DIR),
            },
            preview_resolved: PreviewConfig::default(),
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir)?;
        config.config_path = Some(path.to_path_buf());

        // Validate configuration after loading and resolution
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Checks that all required fields are properly set and contain valid
    /// values. Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_convert()?;
        self.validate_preview()?;
        Ok(())
    }

    /// Validate conversion options.
    fn validate_convert(&self) -> Result<(), ConfigError> {
        const MAX_DIAGRAM_WIDTH: u32 = 4000;

        require_non_empty(&self.convert.code_theme, "convert.code_theme")?;

        let width = self.convert.diagram_width;
        if width == 0 {
            return Err(ConfigError::Validation(
                "convert.diagram_width must be greater than 0".to_owned(),
            ));
        }
        if width > MAX_DIAGRAM_WIDTH {
            return Err(ConfigError::Validation(format!(
                "convert.diagram_width cannot exceed {MAX_DIAGRAM_WIDTH}"
            )));
        }

        Ok(())
    }

    /// Validate preview configuration.
    fn validate_preview(&self) -> Result<(), ConfigError> {
        const MAX_TIMEOUT_SECS: u64 = 600;

        // Only validate kroki_url if set (previews enabled)
        if let Some(ref kroki_url) = self.preview_resolved.kroki_url {
            require_non_empty(kroki_url, "preview.kroki_url")?;
            require_http_url(kroki_url, "preview.kroki_url")?;
        }

        let secs = self.preview_resolved.timeout.as_secs();
        if secs == 0 {
            return Err(ConfigError::Validation(
                "preview.timeout_secs must be greater than 0".to_owned(),
            ));
        }
        if secs > MAX_TIMEOUT_SECS {
            return Err(ConfigError::Validation(format!(
                "preview.timeout_secs cannot exceed {MAX_TIMEOUT_SECS}"
            )));
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref mut preview) = self.preview
            && let Some(ref url) = preview.kroki_url
        {
            preview.kroki_url = Some(expand_env(url, "preview.kroki_url")?);
        }

        Ok(())
    }

    /// Resolve relative paths based on the config file's directory.
    ///
    /// Validates that `kroki_url` is provided when `[preview]` section
    /// exists.
    fn resolve_paths(&mut self, config_dir: &Path) -> Result<(), ConfigError> {
        self.output_resolved = OutputConfig {
            dir: config_dir.join(self.output.dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR)),
        };

        self.preview_resolved = match &self.preview {
            Some(preview) => {
                let kroki_url = preview.kroki_url.clone().ok_or_else(|| {
                    ConfigError::Validation(
                        "[preview] section requires kroki_url to be set".to_owned(),
                    )
                })?;
                PreviewConfig {
                    kroki_url: Some(kroki_url),
                    timeout: Duration::from_secs(
                        preview.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
                    ),
                }
            }
            None => PreviewConfig::default(),
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.output_resolved.dir, PathBuf::from("/test/out"));
        assert_eq!(config.convert.code_theme, "midnight");
        assert_eq!(config.convert.diagram_width, 800);
        assert!(config.preview_resolved.kroki_url.is_none());
        assert_eq!(config.preview_resolved.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.convert.code_theme, "midnight");
        assert_eq!(config.convert.diagram_width, 800);
    }

    #[test]
    fn test_parse_convert_section() {
        let toml = r#"
[convert]
code_theme = "emacs"
diagram_width = 1024
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.convert.code_theme, "emacs");
        assert_eq!(config.convert.diagram_width, 1024);
    }

    #[test]
    fn test_resolve_paths() {
        let toml = r#"
[output]
dir = "artifacts"

[preview]
kroki_url = "https://kroki.io"
timeout_secs = 10
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/project")).unwrap();

        assert_eq!(
            config.output_resolved.dir,
            PathBuf::from("/project/artifacts")
        );
        assert_eq!(
            config.preview_resolved.kroki_url,
            Some("https://kroki.io".to_owned())
        );
        assert_eq!(config.preview_resolved.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_preview_section_requires_kroki_url() {
        let toml = r#"
[preview]
timeout_secs = 10
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        let result = config.resolve_paths(Path::new("/project"));

        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation(_)),
            "Expected ConfigError::Validation, got {err:?}"
        );
        assert!(err.to_string().contains("kroki_url"));
    }

    #[test]
    fn test_no_preview_section_is_valid() {
        let mut config: Config = toml::from_str("").unwrap();
        config.resolve_paths(Path::new("/project")).unwrap();

        assert!(config.preview_resolved.kroki_url.is_none());
        assert_eq!(config.preview_resolved.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/test"));
        let overrides = CliSettings {
            output_dir: Some(PathBuf::from("/elsewhere")),
            kroki_url: Some("https://kroki.internal".to_owned()),
            code_theme: Some("eclipse".to_owned()),
            diagram_width: Some(640),
        };
        config.apply_cli_settings(&overrides);

        assert_eq!(config.output_resolved.dir, PathBuf::from("/elsewhere"));
        assert_eq!(
            config.preview_resolved.kroki_url,
            Some("https://kroki.internal".to_owned())
        );
        assert_eq!(config.convert.code_theme, "eclipse");
        assert_eq!(config.convert.diagram_width, 640);
    }

    #[test]
    fn test_cli_settings_leave_unset_fields_alone() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.apply_cli_settings(&CliSettings::default());

        assert_eq!(config.output_resolved.dir, PathBuf::from("/test/out"));
        assert_eq!(config.convert.code_theme, "midnight");
    }

    #[test]
    fn test_validate_rejects_zero_diagram_width() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.convert.diagram_width = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("diagram_width"));
    }

    #[test]
    fn test_validate_rejects_oversized_diagram_width() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.convert.diagram_width = 5000;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_code_theme() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.convert.code_theme = String::new();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_http_kroki_url() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.preview_resolved.kroki_url = Some("ftp://kroki.io".to_owned());

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default_with_base(Path::new("/test"));
        config.preview_resolved.timeout = Duration::from_secs(0);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_require_kroki_url() {
        let mut config = Config::default_with_base(Path::new("/test"));
        assert!(config.require_kroki_url().is_err());

        config.preview_resolved.kroki_url = Some("https://kroki.io".to_owned());
        assert_eq!(config.require_kroki_url().unwrap(), "https://kroki.io");
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let result = Config::load(Some(Path::new("/nonexistent/mdstage.toml")), None);
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_expand_env_in_kroki_url() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("MDSTAGE_TEST_KROKI", "https://kroki.internal:8000");
        }
        let toml = r#"
[preview]
kroki_url = "${MDSTAGE_TEST_KROKI}"
"#;
        let mut config: Config = toml::from_str(toml).unwrap();
        config.expand_env_vars().unwrap();
        config.resolve_paths(Path::new("/project")).unwrap();

        assert_eq!(
            config.preview_resolved.kroki_url,
            Some("https://kroki.internal:8000".to_owned())
        );
        unsafe {
            std::env::remove_var("MDSTAGE_TEST_KROKI");
        }
    }

    #[test]
    fn test_expand_env_with_default() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("MDSTAGE_UNSET_KROKI");
        }
        let result = expand_env("${MDSTAGE_UNSET_KROKI:-https://kroki.io}", "preview.kroki_url");
        assert_eq!(result.unwrap(), "https://kroki.io");
    }

    #[test]
    fn test_expand_env_missing_var_errors() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("MDSTAGE_MISSING_KROKI");
        }
        let err = expand_env("${MDSTAGE_MISSING_KROKI}", "preview.kroki_url").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("MDSTAGE_MISSING_KROKI"));
        assert!(err.to_string().contains("preview.kroki_url"));
    }

    #[test]
    fn test_bare_dollar_not_expanded() {
        let result = expand_env("https://example.com/$path", "preview.kroki_url").unwrap();
        assert_eq!(result, "https://example.com/$path");
    }
}
