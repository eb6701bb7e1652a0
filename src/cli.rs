use std::path::PathBuf;

use clap::Parser;

/// Scrape card names, tiers and series from the shoob.gg card listing.
///
/// Every page is saved as soon as it is scraped; an interrupted run can be
/// picked up again with `--resume`.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// First page to scrape (overrides the configuration).
    #[arg(long)]
    pub start: Option<u32>,

    /// Last page to scrape (overrides the configuration). Without one, scraping
    /// continues until a page comes back empty; failed pages don't end the run,
    /// so an unreachable site keeps it going until interrupted.
    #[arg(long)]
    pub end: Option<u32>,

    /// Skip pages that are already saved.
    #[arg(long)]
    pub resume: bool,

    /// Print a summary of the saved data and exit.
    #[arg(long)]
    pub summary: bool,

    /// Log debug output.
    #[arg(long)]
    pub verbose: bool,

    /// JSON configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Folder the scraped data is saved in (overrides the configuration).
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Start without asking for confirmation.
    #[arg(short, long)]
    pub yes: bool,
}
