mod error;
mod format;
mod list;
mod logging;
mod meta;

use crate::list::ListOptions;
use crate::list::Lister;
use crate::logging::LogFormat;
use anyhow::anyhow;
use anyhow::Result;
use std::io;
use std::path::PathBuf;
use structopt::clap::AppSettings;
use structopt::StructOpt;

const USAGE: &str = "dirlist [-l] [-R] [-a] [-i] [-h] [directory]";

/// List directory contents.
#[derive(Debug, StructOpt)]
#[structopt(
    usage = USAGE,
    setting = AppSettings::DisableHelpFlags,
    setting = AppSettings::DisableVersion,
    setting = AppSettings::ColorNever)]
struct Opt {
    /// Show permissions, link count, owner, group, size and modification time.
    #[structopt(short = "l")]
    details: bool,

    /// List subdirectories recursively.
    ///
    /// Implies the detailed format.
    #[structopt(short = "R")]
    recursive: bool,

    /// Include entries whose names begin with a dot.
    #[structopt(short = "a")]
    all: bool,

    /// Prefix each detailed row with the inode number.
    #[structopt(short = "i")]
    inode: bool,

    /// Print sizes with a binary unit suffix (B, K, M, G, T).
    #[structopt(short = "h")]
    human_readable: bool,

    /// Format of log messages written to stderr.
    #[structopt(long, default_value = "text", possible_values = LogFormat::NAMES)]
    log_format: LogFormat,

    /// Directory to list.
    #[structopt(parse(from_os_str), default_value = ".")]
    directory: PathBuf,
}

impl Opt {
    fn list_options(&self) -> ListOptions {
        ListOptions {
            show_details: self.details,
            recursive: self.recursive,
            show_hidden: self.all,
            show_inode: self.inode,
            human_readable: self.human_readable,
        }
    }
}

fn main() -> Result<()> {
    let opt = parse_args()?;

    logging::init(opt.log_format);
    tracing::debug!(?opt);

    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut lister = Lister::new(opt.list_options(), stdout.lock(), stderr.lock());
    finish(lister.run(&opt.directory))
}

fn usage() -> String {
    format!("Usage: {}", USAGE)
}

/// Parses the command line, reporting errors with the short usage line
/// instead of clap's help hint.
fn parse_args() -> Result<Opt> {
    let matches = Opt::clap().get_matches_safe().map_err(|err| {
        let reason = err
            .message
            .lines()
            .next()
            .unwrap_or_default()
            .trim_start_matches("error: ")
            .to_string();
        anyhow!("{}\n{}", reason, usage())
    })?;
    Ok(Opt::from_clap(&matches))
}

/// A reader that stops early (`dirlist -R / | head`) is not an error.
fn finish(result: error::Result<()>) -> Result<()> {
    match result {
        Err(err) if err.is_broken_pipe() => {
            tracing::debug!("output closed early");
            Ok(())
        }
        result => Ok(result?),
    }
}
