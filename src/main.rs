use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use seqbrowse::cli::{Args, CacheAction, Command, FavAction, PrefsAction};
use seqbrowse::config::{self, PathConfig};
use seqbrowse::core::{
    ScanJob, ScanObserver, ScanProgress, SequenceScanner, ThumbnailCache, ThumbnailEvent,
    ThumbnailJob,
};
use seqbrowse::entities::ImageSequence;
use seqbrowse::store::{Favorites, Preferences};

const FAVORITES_FILE: &str = "favorites.json";
const PREFERENCES_FILE: &str = "preferences.json";
const LOG_FILE: &str = "seqbrowse.log";
const MIB: f64 = 1024.0 * 1024.0;

/// Prints scan progress to stderr and collects the result
#[derive(Default)]
struct ConsoleObserver {
    sequences: Vec<ImageSequence>,
    error: Option<String>,
    cancelled: bool,
}

impl ScanObserver for ConsoleObserver {
    fn on_progress(&mut self, progress: &ScanProgress) {
        let percent = progress.current * 100 / progress.total.max(1);
        eprintln!("[{:>3}%] {}", percent, progress.message);
    }

    fn on_sequences(&mut self, sequences: Vec<ImageSequence>) {
        self.sequences = sequences;
    }

    fn on_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }

    fn on_finished(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }
}

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| config::config_file(LOG_FILE, path_config));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {:#}", e);
    }

    init_logging(&args, &path_config)?;
    debug!("Command-line args: {:?}", args);

    let prefs_path = config::config_file(PREFERENCES_FILE, &path_config);
    let mut prefs = Preferences::load_or_default(&prefs_path);

    match args.command {
        Command::Scan {
            directory,
            json,
            metadata,
            no_standalone,
        } => {
            let scanner = SequenceScanner::new()
                .with_standalone(prefs.show_standalone_files && !no_standalone)
                .with_metadata(metadata || prefs.read_metadata);
            let sequences = run_scan(scanner, &directory)?;
            remember_directory(&mut prefs, &directory, &prefs_path);

            if json {
                let out = serde_json::to_string_pretty(&sequences)
                    .context("Failed to serialize sequences")?;
                println!("{}", out);
            } else {
                print_sequences(&sequences);
            }
        }

        Command::Thumbs {
            directory,
            size,
            threads,
        } => {
            let size = size.unwrap_or(prefs.thumbnail_size).max(1);
            let threads = match threads {
                Some(n) if n > 0 => n,
                _ => prefs.effective_loader_threads(),
            };
            let scanner = SequenceScanner::new().with_standalone(prefs.show_standalone_files);
            let sequences = run_scan(scanner, &directory)?;
            remember_directory(&mut prefs, &directory, &prefs_path);

            let cache = Arc::new(open_cache(&path_config, &prefs)?);
            let paths: Vec<PathBuf> = sequences.iter().filter_map(|s| s.first_file()).collect();
            run_thumbnails(cache, paths, size, threads)?;
        }

        Command::Cache { action } => {
            let cache = open_cache(&path_config, &prefs)?;
            match action {
                CacheAction::Stats { json } => {
                    let stats = cache.stats();
                    if json {
                        let out = serde_json::to_string_pretty(&stats)
                            .context("Failed to serialize stats")?;
                        println!("{}", out);
                    } else {
                        println!("Cache:  {}", cache.root().display());
                        println!(
                            "Memory: {}/{} items ({} bytes)",
                            stats.memory_items, stats.memory_capacity, stats.memory_bytes
                        );
                        println!(
                            "Disk:   {}/{} items ({:.1}/{:.1} MiB)",
                            stats.disk_items,
                            stats.max_disk_items,
                            stats.disk_bytes as f64 / MIB,
                            stats.max_disk_bytes as f64 / MIB
                        );
                    }
                }
                CacheAction::Clear => {
                    cache.clear().context("Failed to clear thumbnail cache")?;
                    println!("Cleared {}", cache.root().display());
                }
            }
        }

        Command::Fav { action } => {
            let fav_path = config::config_file(FAVORITES_FILE, &path_config);
            let mut favorites = Favorites::load(&fav_path)?;
            match action {
                FavAction::List => {
                    for (i, fav) in favorites.list().iter().enumerate() {
                        println!("{:>3}  {:<24} {}", i, fav.name, fav.path.display());
                    }
                    return Ok(());
                }
                FavAction::Add { path, name } => {
                    let fav = favorites.add_directory(&path, name)?;
                    println!("Added {}: {}", fav.name, fav.path.display());
                }
                FavAction::Remove { name } => {
                    favorites.remove(&name)?;
                }
                FavAction::Rename { old, new } => favorites.rename(&old, new)?,
                FavAction::Move { from, to } => favorites.move_item(from, to)?,
            }
            favorites.save(&fav_path)?;
        }

        Command::Prefs { action } => match action {
            PrefsAction::Show => {
                let out = serde_json::to_string_pretty(&prefs)
                    .context("Failed to serialize preferences")?;
                println!("{}", out);
            }
            PrefsAction::Reset => {
                Preferences::default().save(&prefs_path)?;
                println!("Preferences reset: {}", prefs_path.display());
            }
        },
    }

    Ok(())
}

fn open_cache(path_config: &PathConfig, prefs: &Preferences) -> Result<ThumbnailCache> {
    let root = config::cache_dir(path_config);
    ThumbnailCache::open(&root, prefs.cache_config())
        .with_context(|| format!("Failed to open thumbnail cache: {}", root.display()))
}

/// Run a scan on the worker thread and drain its events here
fn run_scan(scanner: SequenceScanner, directory: &Path) -> Result<Vec<ImageSequence>> {
    let start = Instant::now();
    let job = ScanJob::spawn(scanner, directory.to_path_buf())
        .context("Failed to start scan worker")?;

    let mut observer = ConsoleObserver::default();
    job.drain_into(&mut observer);

    if let Some(message) = observer.error {
        anyhow::bail!(message);
    }
    if observer.cancelled {
        warn!("Scan cancelled");
    }
    info!("Found {} sequences in {:.2?}", observer.sequences.len(), start.elapsed());
    Ok(observer.sequences)
}

fn run_thumbnails(
    cache: Arc<ThumbnailCache>,
    paths: Vec<PathBuf>,
    size: u32,
    threads: usize,
) -> Result<()> {
    let total = paths.len();
    let start = Instant::now();
    let job = ThumbnailJob::spawn(Arc::clone(&cache), paths, size, threads)
        .context("Failed to start thumbnail workers")?;

    let mut loaded = 0usize;
    let mut failed = 0usize;
    job.drain(|event| match event {
        ThumbnailEvent::Loaded { path, thumbnail } => {
            loaded += 1;
            println!("{}x{}  {}", thumbnail.width(), thumbnail.height(), path.display());
        }
        ThumbnailEvent::Failed { path, message } => {
            failed += 1;
            eprintln!("FAILED  {}: {}", path.display(), message);
        }
        ThumbnailEvent::Finished { cancelled } => {
            if cancelled {
                warn!("Thumbnail job cancelled");
            }
        }
    });

    let stats = cache.stats();
    eprintln!(
        "{}/{} thumbnails ({} failed) in {:.2?}, hit rate {:.0}%",
        loaded,
        total,
        failed,
        start.elapsed(),
        stats.hit_rate * 100.0
    );
    Ok(())
}

fn remember_directory(prefs: &mut Preferences, directory: &Path, prefs_path: &Path) {
    let dir = directory.canonicalize().unwrap_or_else(|_| directory.to_path_buf());
    prefs.push_recent(dir);
    if let Err(e) = prefs.save(prefs_path) {
        warn!("Failed to save preferences: {:#}", e);
    }
}

fn print_sequences(sequences: &[ImageSequence]) {
    for seq in sequences {
        let mut line = format!("{:<48} {:>6} frames", seq.display_name(), seq.frame_count());
        if seq.has_gaps() {
            line.push_str(&format!("  missing {}", seq.missing_count()));
        }
        if let Some((w, h)) = seq.resolution {
            line.push_str(&format!("  {}x{}", w, h));
        }
        if let Some(depth) = seq.bit_depth {
            line.push_str(&format!("  {}bit", depth));
        }
        if let Some(cs) = &seq.color_space {
            line.push_str(&format!("  {}", cs));
        }
        println!("{}", line);
    }
    eprintln!("{} entries", sequences.len());
}
