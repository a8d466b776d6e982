use clap::{Parser, Subcommand};
use std::path::PathBuf;

// Build version with codec info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Codecs: image 0.25 (exr, png, jpeg, tiff, tga, hdr, bmp, gif)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Image sequence browser: scan directories, build thumbnails, manage favorites
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging to file (default: seqbrowse.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE", global = true)]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Detect image sequences in a directory
    Scan {
        #[arg(value_name = "DIR")]
        directory: PathBuf,

        /// Print sequences as JSON
        #[arg(long)]
        json: bool,

        /// Read resolution / bit depth from the first frame of each sequence
        #[arg(short = 'm', long)]
        metadata: bool,

        /// Hide files that are not part of a numbered sequence
        #[arg(long = "no-standalone")]
        no_standalone: bool,
    },

    /// Generate (or load cached) thumbnails for the first frame of each sequence
    Thumbs {
        #[arg(value_name = "DIR")]
        directory: PathBuf,

        /// Thumbnail size in px (default: from preferences)
        #[arg(short = 's', long, value_name = "PX")]
        size: Option<u32>,

        /// Loader threads (default: from preferences, 0 = auto)
        #[arg(short = 't', long, value_name = "N")]
        threads: Option<usize>,
    },

    /// Thumbnail cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Favorite directories
    Fav {
        #[command(subcommand)]
        action: FavAction,
    },

    /// Preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show hit/miss counters and disk usage
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Remove all cached thumbnails
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum FavAction {
    List,
    Add {
        #[arg(value_name = "DIR")]
        path: PathBuf,
        /// Display name (default: directory name)
        #[arg(short = 'n', long)]
        name: Option<String>,
    },
    Remove {
        name: String,
    },
    Rename {
        old: String,
        new: String,
    },
    /// Move entry FROM to position TO (0-based)
    Move {
        from: usize,
        to: usize,
    },
}

#[derive(Subcommand, Debug)]
pub enum PrefsAction {
    Show,
    /// Restore defaults
    Reset,
}
