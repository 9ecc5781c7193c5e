use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use sphcorpus::audio::{SphereFormat, WavClip, read_header, write_sphere};
use sphcorpus::cli::{Cli, Commands, ConfigAction};
use sphcorpus::config::Config;
use sphcorpus::corpus::{Corpus, FrameBatcher, SplitKind, find_files};
use sphcorpus::defaults;
use sphcorpus::speech::{Speech, SpeechId};
use sphcorpus::transcript::TranscriptParser;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Header { file, json } => {
            show_header(&file, json)?;
        }
        Commands::Transcript { path } => {
            let config = load_config(cli.config.as_deref())?;
            show_transcripts(&path, config.transcript.reject_out_of_order)?;
        }
        Commands::Scan {
            split,
            skip_count,
            max_speeches,
            root,
            batch_size,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(root) = root {
                config.corpus.root = root;
            }
            if let Some(skip) = skip_count {
                config.corpus.skip_count = skip;
            }
            if max_speeches.is_some() {
                config.corpus.max_speeches = max_speeches;
            }
            scan_split(&config, split, batch_size)?;
        }
        Commands::Check { workers, root } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(root) = root {
                config.corpus.root = root;
            }
            check_headers(&config, workers)?;
        }
        Commands::Dump {
            sph,
            output,
            transcript,
        } => {
            let config = load_config(cli.config.as_deref())?;
            dump_speech(&config, sph, transcript, output.as_deref())?;
        }
        Commands::Wav { file, window } => {
            let config = load_config(cli.config.as_deref())?;
            let window = window.unwrap_or_else(|| config.window_size());
            show_wav(&file, window)?;
        }
        Commands::Convert {
            wav,
            sph,
            big_endian,
        } => {
            convert_wav(&wav, &sph, big_endian)?;
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "sphcorpus",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Route `log` records to stderr.
///
/// `RUST_LOG` takes precedence over the level chosen by `-v`/`--quiet`.
fn init_logging(quiet: bool, verbose: u8) {
    let level = if quiet {
        log::LevelFilter::Error
    } else {
        match verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config)
/// 2. Default config path (~/.config/sphcorpus/config.toml)
/// 3. Built-in defaults with environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}

fn show_header(path: &Path, json: bool) -> Result<()> {
    let mut reader = BufReader::new(File::open(path)?);
    let format = read_header(&mut reader, &path.display().to_string())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&format)?);
        return Ok(());
    }

    println!("{}", path.display().bold());
    print_field("sample_rate", &format.sample_rate.to_string());
    print_field("channel_count", &format.channel_count.to_string());
    print_field(
        "byte_format",
        &format!("{} ({})", format.byte_format, format.pcm_format_tag()),
    );
    print_field("sample_n_bytes", &format.sample_n_bytes.to_string());
    print_field("sample_sig_bits", &format.significant_bits.to_string());
    print_field("sample_coding", &format.coding);
    for (key, value) in &format.extra {
        print_field(key, &value.to_string());
    }
    if let Some(count) = format.sample_count() {
        let secs = count as f64 / f64::from(format.sample_rate.max(1));
        print_field("duration", &format!("{:.2}s", secs));
    }
    Ok(())
}

fn print_field(key: &str, value: &str) {
    println!("  {:<18} {}", format!("{}:", key).dimmed(), value);
}

fn show_transcripts(path: &Path, reject_out_of_order: bool) -> Result<()> {
    let files = if path.is_dir() {
        find_files(path, "stm")?
    } else {
        vec![path.to_path_buf()]
    };
    let list_segments = files.len() == 1;

    let mut total_segments = 0;
    for file in &files {
        let mut parser = TranscriptParser::open(file)?.reject_out_of_order(reject_out_of_order);
        let mut segments = 0;
        let mut rejected = 0;
        let mut speech_secs = 0.0;
        for segment in parser.by_ref() {
            match segment {
                Ok(segment) => {
                    if list_segments {
                        println!(
                            "{:>9.2} {:>9.2}  {}  {}",
                            segment.start,
                            segment.stop,
                            segment.speaker.dimmed(),
                            segment.transcript
                        );
                    }
                    segments += 1;
                    speech_secs += segment.duration();
                }
                Err(e) if e.is_segment_local() => rejected += 1,
                Err(e) => return Err(e.into()),
            }
        }
        total_segments += segments;

        let malformed = parser.malformed_lines();
        let summary = format!(
            "{}: {} segments, {:.1}s of speech",
            file.display(),
            segments,
            speech_secs
        );
        if malformed + rejected > 0 {
            println!(
                "{} {}",
                summary,
                format!("({} malformed, {} out of order)", malformed, rejected).yellow()
            );
        } else {
            println!("{}", summary);
        }
    }

    if files.len() > 1 {
        println!(
            "{} {} segments in {} files",
            "Total:".bold(),
            total_segments,
            files.len()
        );
    }
    Ok(())
}

fn scan_split(config: &Config, kind: SplitKind, batch_size: Option<usize>) -> Result<()> {
    let corpus = Corpus::from_config(config)?;
    let split = corpus.split(kind);
    let skip_count = config.corpus.skip_count;
    println!(
        "{} {} ({} speeches, window {}, keeping 1/{})",
        "Split:".bold(),
        kind,
        split.len(),
        corpus.window_size(),
        skip_count
    );

    let stats = if let Some(batch_size) = batch_size {
        let (mut frames, transcripts) = split.inputs_and_targets(skip_count)?;
        let batches = FrameBatcher::new(&mut frames)
            .batch_size(batch_size)
            .return_last_incomplete_batch(true)
            .count();
        // The frame side drained the stream; the transcripts are buffered.
        let labels = transcripts.count();
        println!(
            "  {:<10} {} batches of up to {} frames, {} transcripts",
            "Batches:".dimmed(),
            batches,
            batch_size,
            labels
        );
        frames.stats()
    } else {
        let mut stream = split.stream(skip_count)?;
        let mut frames = 0;
        let mut longest = 0;
        let mut words = 0;
        for record in stream.by_ref() {
            let rows = record.frames.nrows();
            frames += rows;
            longest = longest.max(rows);
            words += record.transcript().split_whitespace().count();
        }
        println!(
            "  {:<10} {} total, longest {} x {}",
            "Frames:".dimmed(),
            frames,
            longest,
            corpus.window_size()
        );
        println!("  {:<10} {}", "Words:".dimmed(), words);
        stream.stats()
    };

    println!(
        "  {:<10} {} yielded of {} aligned",
        "Records:".dimmed(),
        stats.yielded,
        stats.aligned
    );
    if stats.skipped_segments + stats.skipped_speeches > 0 {
        println!(
            "  {:<10} {}",
            "Skipped:".dimmed(),
            format!(
                "{} segments, {} speeches",
                stats.skipped_segments, stats.skipped_speeches
            )
            .yellow()
        );
    }
    Ok(())
}

fn check_headers(config: &Config, workers: usize) -> Result<()> {
    let corpus = Corpus::from_config(config)?;
    let failures = corpus.prefetch_headers(workers);

    for kind in SplitKind::ALL {
        println!("  {:<6} {} speeches", kind, corpus.split(kind).len());
    }
    for (id, error) in &failures {
        let path = corpus
            .speech(*id)
            .map(|s| s.audio_path().display().to_string())
            .unwrap_or_default();
        println!("{} {}: {}", "✗".red(), path, error);
    }

    let total = corpus.speeches().len();
    if !failures.is_empty() {
        bail!("{} of {} headers could not be read", failures.len(), total);
    }
    println!("{} All {} headers OK", "✓".green(), total);
    Ok(())
}

fn dump_speech(
    config: &Config,
    sph: PathBuf,
    transcript: Option<PathBuf>,
    output: Option<&Path>,
) -> Result<()> {
    let window = config.window_size();
    let speech = match transcript {
        Some(transcript) => Speech::with_transcript(SpeechId(0), sph, transcript, window),
        None => Speech::new(SpeechId(0), sph, window),
    }
    .reject_out_of_order(config.transcript.reject_out_of_order);

    let written = match output {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            let written = speech.write_native_pcm(&mut out)?;
            out.flush()?;
            written
        }
        None => {
            let mut out = std::io::stdout().lock();
            let written = speech.write_native_pcm(&mut out)?;
            out.flush()?;
            written
        }
    };

    let format = speech.format()?;
    log::info!(
        "Wrote {} bytes of {} at {} Hz",
        written,
        format.native_pcm_tag(),
        format.sample_rate
    );
    Ok(())
}

fn show_wav(path: &Path, window: usize) -> Result<()> {
    let clip = WavClip::open(path)?;
    let duration = clip.duration_secs();
    let sample_rate = clip.sample_rate;
    let total = clip.samples.len();
    let frames = clip.into_frames(window)?;
    let (rows, cols) = frames.dim();

    println!("{}", path.display().bold());
    print_field("sample_rate", &sample_rate.to_string());
    print_field("duration", &format!("{:.2}s", duration));
    print_field("frames", &format!("{} x {}", rows, cols));
    print_field("dropped", &format!("{} samples", total - rows * cols));
    Ok(())
}

fn convert_wav(wav: &Path, sph: &Path, big_endian: bool) -> Result<()> {
    let clip = WavClip::open(wav)?;
    let mut format: SphereFormat = clip.sphere_format();
    if big_endian {
        format.byte_format = defaults::BIG_ENDIAN_BYTE_FORMAT.to_string();
    }

    let mut out = BufWriter::new(File::create(sph)?);
    write_sphere(&mut out, &format, &clip.samples)?;
    out.flush()?;

    println!(
        "{} {} -> {} ({} samples, {})",
        "✓".green(),
        wav.display(),
        sph.display(),
        clip.samples.len(),
        format.pcm_format_tag()
    );
    Ok(())
}

/// Handle configuration commands.
fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    let config_path = custom_path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    match action {
        ConfigAction::Show => {
            let config = load_config(custom_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
            println!("# window_size = {} (effective)", config.window_size());
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }
    Ok(())
}
