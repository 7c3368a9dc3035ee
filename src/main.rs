// src/main.rs
// =============================================================================
// This is the entry point of site-mirror.
//
// What happens here:
// 1. Set up logging and parse command-line arguments
// 2. Validate them into a MirrorConfig
// 3. Run the crawler over the seeds
// 4. Print the crawl report
// 5. Exit with proper code (0 = crawl finished, 2 = startup error)
//
// Failures of individual pages only show up in the logs and in the report,
// they never change the exit code.
// =============================================================================

mod cli;
mod config;
mod crawl;
mod logging;
mod page;

use anyhow::{Context, Result};
use clap::Parser;

use cli::Cli;
use config::MirrorConfig;
use crawl::{CrawlReport, Crawler};
use page::HttpPageProcessor;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose)?;

    let config = MirrorConfig::from_cli(cli)?;

    let processor = HttpPageProcessor::new(config.timeout, &config.user_agent)
        .context("building the HTTP client")?;
    let crawler = Crawler::new(
        processor,
        config.parallelism,
        config.max_depth,
        config.root.clone(),
    );

    let report = crawler.run(config.seeds).await;
    print_report(&report, config.json)?;

    Ok(0)
}

// Prints the report either as a summary or JSON
fn print_report(report: &CrawlReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", format_summary(report));
    }
    Ok(())
}

fn format_summary(report: &CrawlReport) -> String {
    let mut out = String::new();

    for file in &report.files {
        out.push_str(&format!("   {}\n", file.display()));
    }
    if !report.files.is_empty() {
        out.push('\n');
    }

    out.push_str("📊 Summary:\n");
    out.push_str(&format!("   🌱 Seeds: {}\n", report.seeds));
    out.push_str(&format!("   🔍 Visited: {}\n", report.visited));
    out.push_str(&format!("   ✅ Saved: {}\n", report.saved));
    out.push_str(&format!("   ⏭️  Skipped: {}\n", report.skipped));
    out.push_str(&format!("   ❌ Failed: {}\n", report.failed));
    out.push_str(&format!("   🔁 Duplicates: {}\n", report.duplicates));
    out.push_str(&format!("   🪞 Aliases: {}\n", report.aliases));
    out.push_str(&format!("   ⏱️  Elapsed: {} ms\n", report.elapsed_ms));
    out
}
