//! Command-line interface for sphcorpus
//!
//! Provides argument parsing using clap derive macros.

use crate::corpus::SplitKind;
use crate::defaults;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Inspect and stream NIST SPHERE speech corpora
#[derive(Parser, Debug)]
#[command(
    name = "sphcorpus",
    version = crate::version_string(),
    about = "Inspect and stream NIST SPHERE speech corpora"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parse a split name (train, valid/dev, test).
fn parse_split(s: &str) -> Result<SplitKind, String> {
    SplitKind::parse(s.trim())
        .ok_or_else(|| format!("unknown split '{}', expected train, valid or test", s))
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the header fields of a SPHERE file
    Header {
        /// SPHERE audio file
        file: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse an .stm file, or every .stm file below a directory
    Transcript {
        /// File or directory
        path: PathBuf,
    },

    /// Stream one split and report record counts and shapes
    Scan {
        /// Split to stream (train, valid, test)
        #[arg(long, value_name = "SPLIT", default_value = "train", value_parser = parse_split)]
        split: SplitKind,

        /// Keep every Nth aligned record (overrides config)
        #[arg(long, value_name = "N")]
        skip_count: Option<usize>,

        /// Cap on speeches per split (overrides config)
        #[arg(long, value_name = "N")]
        max_speeches: Option<usize>,

        /// Corpus root (overrides config)
        #[arg(long, value_name = "PATH")]
        root: Option<PathBuf>,

        /// Also count minibatches of this many frames
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,
    },

    /// Parse every header in the corpus in parallel
    Check {
        /// Number of worker threads
        #[arg(long, short = 'w', value_name = "N", default_value_t = defaults::PROBE_WORKERS)]
        workers: usize,

        /// Corpus root (overrides config)
        #[arg(long, value_name = "PATH")]
        root: Option<PathBuf>,
    },

    /// Write the aligned segments of one speech as native-order PCM
    Dump {
        /// SPHERE audio file
        sph: PathBuf,

        /// Output file (default: stdout)
        #[arg(long, short = 'o', value_name = "PATH")]
        output: Option<PathBuf>,

        /// Transcript file (default: ../stm/<name>.stm)
        #[arg(long, value_name = "PATH")]
        transcript: Option<PathBuf>,
    },

    /// Cut a 16-bit mono WAV file into whole windows
    Wav {
        /// WAV file
        file: PathBuf,

        /// Window length in samples (default: from config)
        #[arg(long, value_name = "SAMPLES")]
        window: Option<usize>,
    },

    /// Convert a 16-bit mono WAV file to SPHERE
    Convert {
        /// Input WAV file
        wav: PathBuf,

        /// Output SPHERE file
        sph: PathBuf,

        /// Store samples big-endian
        #[arg(long)]
        big_endian: bool,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_includes_build_hash() {
        use clap::CommandFactory;
        let command = Cli::command();
        assert_eq!(command.get_version(), Some(crate::version_string().as_str()));

        let err = Cli::try_parse_from(["sphcorpus", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        assert!(err.to_string().contains(&crate::version_string()));
    }

    #[test]
    fn test_command_is_required() {
        let result = Cli::try_parse_from(["sphcorpus"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_verbose_single() {
        let cli = Cli::try_parse_from(["sphcorpus", "-v", "config", "path"]).unwrap();
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["sphcorpus", "-vv", "config", "path"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_global_options_after_command() {
        let cli = Cli::try_parse_from([
            "sphcorpus",
            "check",
            "--quiet",
            "--config",
            "/path/to/config.toml",
        ])
        .unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
    }

    #[test]
    fn test_parse_header() {
        let cli = Cli::try_parse_from(["sphcorpus", "header", "a.sph", "--json"]).unwrap();
        match cli.command {
            Commands::Header { file, json } => {
                assert_eq!(file, PathBuf::from("a.sph"));
                assert!(json);
            }
            _ => panic!("Expected Header command"),
        }
    }

    #[test]
    fn test_header_requires_file() {
        assert!(Cli::try_parse_from(["sphcorpus", "header"]).is_err());
    }

    #[test]
    fn test_parse_scan_defaults() {
        let cli = Cli::try_parse_from(["sphcorpus", "scan"]).unwrap();
        match cli.command {
            Commands::Scan {
                split,
                skip_count,
                max_speeches,
                root,
                batch_size,
            } => {
                assert_eq!(split, SplitKind::Train);
                assert!(skip_count.is_none());
                assert!(max_speeches.is_none());
                assert!(root.is_none());
                assert!(batch_size.is_none());
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn test_parse_scan_with_options() {
        let cli = Cli::try_parse_from([
            "sphcorpus",
            "scan",
            "--split",
            "dev",
            "--skip-count",
            "3",
            "--max-speeches",
            "2",
            "--root",
            "/data/ted",
        ])
        .unwrap();
        match cli.command {
            Commands::Scan {
                split,
                skip_count,
                max_speeches,
                root,
                ..
            } => {
                assert_eq!(split, SplitKind::Valid);
                assert_eq!(skip_count, Some(3));
                assert_eq!(max_speeches, Some(2));
                assert_eq!(root, Some(PathBuf::from("/data/ted")));
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn test_parse_scan_rejects_unknown_split() {
        let result = Cli::try_parse_from(["sphcorpus", "scan", "--split", "holdout"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_check_default_workers() {
        let cli = Cli::try_parse_from(["sphcorpus", "check"]).unwrap();
        match cli.command {
            Commands::Check { workers, root } => {
                assert_eq!(workers, defaults::PROBE_WORKERS);
                assert!(root.is_none());
            }
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn test_parse_check_short_workers() {
        let cli = Cli::try_parse_from(["sphcorpus", "check", "-w", "8"]).unwrap();
        assert!(matches!(cli.command, Commands::Check { workers: 8, .. }));
    }

    #[test]
    fn test_parse_dump() {
        let cli =
            Cli::try_parse_from(["sphcorpus", "dump", "talk.sph", "-o", "talk.pcm"]).unwrap();
        match cli.command {
            Commands::Dump {
                sph,
                output,
                transcript,
            } => {
                assert_eq!(sph, PathBuf::from("talk.sph"));
                assert_eq!(output, Some(PathBuf::from("talk.pcm")));
                assert!(transcript.is_none());
            }
            _ => panic!("Expected Dump command"),
        }
    }

    #[test]
    fn test_parse_wav_with_window() {
        let cli = Cli::try_parse_from(["sphcorpus", "wav", "a.wav", "--window", "512"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Wav {
                window: Some(512),
                ..
            }
        ));
    }

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from(["sphcorpus", "convert", "in.wav", "out.sph", "--big-endian"])
            .unwrap();
        match cli.command {
            Commands::Convert {
                wav,
                sph,
                big_endian,
            } => {
                assert_eq!(wav, PathBuf::from("in.wav"));
                assert_eq!(sph, PathBuf::from("out.sph"));
                assert!(big_endian);
            }
            _ => panic!("Expected Convert command"),
        }
    }

    #[test]
    fn test_convert_requires_both_paths() {
        assert!(Cli::try_parse_from(["sphcorpus", "convert", "in.wav"]).is_err());
    }

    #[test]
    fn test_parse_config_show() {
        let cli = Cli::try_parse_from(["sphcorpus", "config", "show"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
    }

    #[test]
    fn test_config_requires_subcommand() {
        assert!(Cli::try_parse_from(["sphcorpus", "config"]).is_err());
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["sphcorpus", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Completions { shell: Shell::Bash }
        ));
    }

    #[test]
    fn test_parse_split_aliases() {
        assert_eq!(parse_split("validation"), Ok(SplitKind::Valid));
        assert_eq!(parse_split("TEST"), Ok(SplitKind::Test));
        assert!(parse_split("eval").is_err());
    }
}
