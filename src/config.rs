use crate::audio::window_size_for_duration;
use crate::defaults;
use crate::error::{CorpusError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub transcript: TranscriptConfig,
}

/// Corpus location and streaming configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorpusConfig {
    pub root: PathBuf,
    /// Sample rate used to turn `window_duration` into a sample count.
    pub sample_rate: u32,
    /// Window length in seconds.
    pub window_duration: f64,
    /// Explicit window length in samples; overrides `window_duration`.
    pub window_size: Option<usize>,
    pub skip_count: usize,
    /// Cap on speeches per split.
    pub max_speeches: Option<usize>,
}

/// Transcript parsing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct TranscriptConfig {
    /// Skip segments whose start precedes the previous segment's start.
    pub reject_out_of_order: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            sample_rate: defaults::CORPUS_SAMPLE_RATE,
            window_duration: defaults::WINDOW_DURATION,
            window_size: None,
            skip_count: defaults::SKIP_COUNT,
            max_speeches: None,
        }
    }
}

fn default_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sphcorpus")
        .join(defaults::CORPUS_DIR_NAME)
}

fn invalid(key: &str, message: &str) -> CorpusError {
    CorpusError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(CorpusError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - SPHCORPUS_ROOT → corpus.root
    /// - SPHCORPUS_SKIP_COUNT → corpus.skip_count
    /// - SPHCORPUS_MAX_SPEECHES → corpus.max_speeches
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var("SPHCORPUS_ROOT")
            && !root.is_empty()
        {
            self.corpus.root = PathBuf::from(root);
        }

        if let Ok(skip) = std::env::var("SPHCORPUS_SKIP_COUNT")
            && let Ok(skip) = skip.trim().parse()
        {
            self.corpus.skip_count = skip;
        }

        if let Ok(max) = std::env::var("SPHCORPUS_MAX_SPEECHES")
            && let Ok(max) = max.trim().parse()
        {
            self.corpus.max_speeches = Some(max);
        }

        self
    }

    /// Window length in samples.
    pub fn window_size(&self) -> usize {
        self.corpus.window_size.unwrap_or_else(|| {
            window_size_for_duration(self.corpus.window_duration, self.corpus.sample_rate)
        })
    }

    /// Reject values the corpus cannot stream with.
    pub fn validate(&self) -> Result<()> {
        if self.corpus.skip_count == 0 {
            return Err(invalid("corpus.skip_count", "must be at least 1"));
        }
        if self.corpus.window_size == Some(0) {
            return Err(invalid("corpus.window_size", "must be at least 1"));
        }
        if self.corpus.window_size.is_none() {
            if self.corpus.sample_rate == 0 {
                return Err(invalid("corpus.sample_rate", "must be positive"));
            }
            if !(self.corpus.window_duration.is_finite() && self.corpus.window_duration > 0.0) {
                return Err(invalid(
                    "corpus.window_duration",
                    &format!("must be positive, got {}", self.corpus.window_duration),
                ));
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/sphcorpus/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("sphcorpus")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_sphcorpus_env() {
        remove_env("SPHCORPUS_ROOT");
        remove_env("SPHCORPUS_SKIP_COUNT");
        remove_env("SPHCORPUS_MAX_SPEECHES");
    }

    fn write_config(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert!(config.corpus.root.ends_with("sphcorpus/TEDLIUM_release2"));
        assert_eq!(config.corpus.sample_rate, 16000);
        assert_eq!(config.corpus.window_duration, 0.01);
        assert_eq!(config.corpus.window_size, None);
        assert_eq!(config.corpus.skip_count, 1);
        assert_eq!(config.corpus.max_speeches, None);
        assert!(!config.transcript.reject_out_of_order);
    }

    #[test]
    fn test_default_window_is_256_samples() {
        assert_eq!(Config::default().window_size(), 256);
    }

    #[test]
    fn test_explicit_window_size_wins() {
        let mut config = Config::default();
        config.corpus.window_size = Some(400);
        config.corpus.window_duration = 0.5;
        assert_eq!(config.window_size(), 400);
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_file = write_config(
            r#"
            [corpus]
            root = "/data/ted"
            sample_rate = 8000
            window_duration = 0.025
            skip_count = 4
            max_speeches = 10

            [transcript]
            reject_out_of_order = true
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.corpus.root, PathBuf::from("/data/ted"));
        assert_eq!(config.corpus.sample_rate, 8000);
        assert_eq!(config.corpus.window_duration, 0.025);
        assert_eq!(config.corpus.skip_count, 4);
        assert_eq!(config.corpus.max_speeches, Some(10));
        assert!(config.transcript.reject_out_of_order);
        // 0.025 * 8000 = 200 → 256
        assert_eq!(config.window_size(), 256);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let temp_file = write_config(
            r#"
            [corpus]
            skip_count = 3
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.corpus.skip_count, 3);
        assert_eq!(config.corpus.sample_rate, 16000);
        assert_eq!(config.corpus.max_speeches, None);
        assert_eq!(config.transcript, TranscriptConfig::default());
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let temp_file = write_config(
            r#"
            [corpus
            root = "broken
        "#,
        );

        let result = Config::load(temp_file.path());

        assert!(matches!(result, Err(CorpusError::Config(_))));
    }

    #[test]
    fn test_wrong_value_type_returns_error() {
        let temp_file = write_config("[corpus]\nskip_count = \"often\"\n");
        assert!(Config::load(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_sphcorpus_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_errors_on_invalid_toml() {
        let temp_file = write_config("[corpus\n");
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_env_override_root() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_sphcorpus_env();

        set_env("SPHCORPUS_ROOT", "/mnt/corpora/ted");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.corpus.root, PathBuf::from("/mnt/corpora/ted"));
        assert_eq!(config.corpus.skip_count, 1); // Not overridden

        clear_sphcorpus_env();
    }

    #[test]
    fn test_env_override_counts() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_sphcorpus_env();

        set_env("SPHCORPUS_SKIP_COUNT", "5");
        set_env("SPHCORPUS_MAX_SPEECHES", " 20 ");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.corpus.skip_count, 5);
        assert_eq!(config.corpus.max_speeches, Some(20));

        clear_sphcorpus_env();
    }

    #[test]
    fn test_env_override_empty_or_unparsable_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_sphcorpus_env();

        set_env("SPHCORPUS_ROOT", "");
        set_env("SPHCORPUS_SKIP_COUNT", "lots");
        set_env("SPHCORPUS_MAX_SPEECHES", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config, Config::default());

        clear_sphcorpus_env();
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_skip_count() {
        let mut config = Config::default();
        config.corpus.skip_count = 0;

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("corpus.skip_count"));
    }

    #[test]
    fn test_validate_rejects_zero_window_size() {
        let mut config = Config::default();
        config.corpus.window_size = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_duration() {
        for duration in [0.0, -0.01, f64::NAN] {
            let mut config = Config::default();
            config.corpus.window_duration = duration;
            assert!(config.validate().is_err(), "accepted {duration}");
        }
    }

    #[test]
    fn test_validate_rejects_zero_sample_rate() {
        let mut config = Config::default();
        config.corpus.sample_rate = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_path_is_xdg_compliant() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains("sphcorpus"));
        assert!(path_str.ends_with("config.toml"));
    }

    #[test]
    fn test_config_serializes_to_toml() {
        let mut config = Config::default();
        config.corpus.max_speeches = Some(3);
        let rendered = toml::to_string(&config).unwrap();

        assert!(rendered.contains("[corpus]"));
        assert!(rendered.contains("max_speeches = 3"));
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
