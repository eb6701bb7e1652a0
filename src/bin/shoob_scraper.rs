use std::{future::Future, io::Write as _, pin::pin, process::ExitCode};

use anyhow::Context as _;
use clap::Parser as _;
use futures::FutureExt as _;
use shoob_scraper::{
    cli::Cli,
    config::{Config, Plan},
    fetcher::PageFetcher as _,
    orchestrator::{self, RunState, RunStats},
    shoob::ShoobFetcher,
    store::{self, Store as _, Summary},
};
use tokio::sync::oneshot;

#[tokio::main]
async fn main() -> ExitCode {
    match try_main().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn try_main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    shoob_scraper::logging::init(cli.verbose).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    let mut interrupted = pin!(interrupted().fuse());
    // the first poll installs the handler; from here on ctrl-c no longer kills the process
    if (&mut interrupted).now_or_never().is_some() {
        println!("Scraping cancelled by user");
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = Config::load(cli.config.as_deref()).context("load configuration")?;
    if let Some(output) = cli.output.clone() {
        config.output_folder = output;
    }
    config.validate().context("check configuration")?;

    let mut store = store::file::File::open(&config.output_folder)
        .await
        .context("open output folder")?;

    if cli.summary {
        let summary = store.summarize().await.context("summarize saved data")?;
        print_summary(&summary);
        return Ok(ExitCode::SUCCESS);
    }

    let plan = Plan::from_config(&config)
        .with_overrides(cli.start, cli.end, cli.resume)
        .context("page range")?;
    print_plan(&plan, &config);

    if !plan.resume && !cli.yes {
        match confirm("Ready to start scraping? (y/N): ", &mut interrupted).await? {
            Some(true) => {}
            answer => {
                if answer.is_none() {
                    println!();
                }
                println!("Scraping cancelled by user");
                return Ok(ExitCode::SUCCESS);
            }
        }
    }

    let mut fetcher = ShoobFetcher::connect(&config).context("open session")?;
    let report = orchestrator::run(&plan, &mut store, &mut fetcher, &mut interrupted).await;
    fetcher.close().await;

    print_stats(&report.stats);
    match report.state {
        RunState::Completed => {
            if report.stats.cards_extracted > 0 {
                let summary = store.summarize().await.context("summarize saved data")?;
                print_summary(&summary);
            }
            println!("All data saved to: {}", config.output_folder.display());
            Ok(ExitCode::SUCCESS)
        }
        RunState::Cancelled => {
            println!("Scraping interrupted. Completed pages have been saved.");
            println!("Use --resume to continue from where you left off.");
            Ok(ExitCode::SUCCESS)
        }
        RunState::Failed(err) => Err(err).context("scraping stopped"),
    }
}

async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("can't listen for ctrl-c: {err}");
        futures::future::pending::<()>().await;
    }
}

/// Asks on stdin. `None` when `cancel` resolves before an answer arrives.
async fn confirm<C>(prompt: &str, cancel: C) -> anyhow::Result<Option<bool>>
where
    C: Future<Output = ()> + Unpin,
{
    print!("{prompt}");
    std::io::stdout().flush().context("flush stdout")?;

    // a blocked read can't be cancelled, so it gets a thread the runtime won't wait for
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut answer = String::new();
        let _ = tx.send(std::io::stdin().read_line(&mut answer).map(|_| answer));
    });

    tokio::select! {
        biased;
        () = cancel => Ok(None),
        answer = rx => {
            let answer = answer
                .context("stdin reader went away")?
                .context("read confirmation")?;
            Ok(Some(matches!(
                answer.trim().to_ascii_lowercase().as_str(),
                "y" | "yes"
            )))
        }
    }
}

fn print_plan(plan: &Plan, config: &Config) {
    println!("Scraping plan:");
    println!("  Start page: {}", plan.start);
    match plan.end {
        Some(end) => println!("  End page: {end}"),
        None => println!("  End page: until no more cards"),
    }
    if plan.resume {
        println!("  Resume: skipping pages already saved");
    }
    println!("  Data folder: {}", config.output_folder.display());
}

fn print_stats(stats: &RunStats) {
    println!("Pages scraped: {}", stats.pages_scraped);
    println!("Pages skipped: {}", stats.pages_skipped);
    println!("Cards extracted: {}", stats.cards_extracted);
    println!("Errors: {}", stats.errors);
    println!("Success rate: {:.1}%", stats.success_rate());
    println!("Total time: {:.2}s", stats.elapsed.as_secs_f64());
    println!("Speed: {:.2} cards/sec", stats.cards_per_second());
}

fn print_summary(summary: &Summary) {
    println!("Output file: {}", summary.output);
    println!("Total cards: {}", summary.total_cards);
    if !summary.scraped_pages.is_empty() {
        println!("Pages scraped: {:?}", summary.scraped_pages);
    }
    if !summary.sample_cards.is_empty() {
        println!("Sample cards:");
        for card in &summary.sample_cards {
            println!("  - {} (Tier {}) from {}", card.name, card.tier, card.series);
        }
    }
    if summary.file_size > 0 {
        println!("File size: {} MB", summary.file_size_mb());
    }
}
