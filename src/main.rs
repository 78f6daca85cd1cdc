use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use swlc::utils::{format_date, format_numbers};
use swlc::{FreshnessOutcome, LotteryService, LotteryType, SyncReport, config};

#[derive(Parser)]
#[command(name = "swlc")]
#[command(about = "Sync and inspect China Welfare Lottery draw results")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Force a sync of one lottery type
    Sync {
        /// ssq, 3d, qlc or kl8
        #[arg(short, long)]
        lottery: LotteryType,
        /// Periods to fetch (1-50)
        #[arg(short, long, default_value = "10")]
        periods: usize,
    },
    /// Force a sync of every lottery type
    SyncAll {
        #[arg(short, long, default_value = "30")]
        periods: usize,
    },
    /// Show stored records and recent sync attempts
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load()?;
    let service = LotteryService::open(&config)?;

    match cli.command {
        Commands::Sync { lottery, periods } => {
            let report = service.sync(lottery, periods).await?;
            print_report(&report);
        }
        Commands::SyncAll { periods } => {
            for report in service.sync_all(periods).await? {
                print_report(&report);
            }
        }
        Commands::Info => print_info(&service)?,
    }

    Ok(())
}

fn print_report(report: &SyncReport) {
    println!("{}", report_line(report));
}

fn report_line(report: &SyncReport) -> String {
    let name = report.lottery_type.name();
    match report.outcome {
        FreshnessOutcome::RefreshFailedServingStale => format!(
            "❌ {} sync failed: {}",
            name,
            report.error.as_deref().unwrap_or("unknown error")
        ),
        _ => format!(
            "✅ {} ({}): fetched {}, inserted {}, rejected {}",
            name, report.outcome, report.fetched, report.inserted, report.rejected
        ),
    }
}

fn print_info(service: &LotteryService) -> Result<()> {
    let info = service.database_info()?;

    println!("📋 Stored draws");
    for summary in &info.types {
        println!(
            "  {:<4} {:<6} {:>6} records, latest {}, last sync {}",
            summary.lottery_type.code(),
            summary.name,
            summary.records,
            summary.latest_period.as_deref().unwrap_or("-"),
            summary
                .last_sync
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        );
    }

    for lottery_type in LotteryType::ALL {
        if let Some(draw) = service.latest_stored(lottery_type)? {
            let positional = lottery_type.spec().positional;
            println!(
                "  {} {} {}: {} {}",
                lottery_type.name(),
                draw.period,
                format_date(draw.draw_date),
                format_numbers(&draw.drawn_numbers, positional),
                format_numbers(&draw.special_numbers, positional),
            );
        }
    }

    println!("🕒 Recent syncs");
    for log in &info.recent_syncs {
        println!(
            "  #{} {} {} {} merged={} rejected={}{}",
            log.id,
            log.synced_at.to_rfc3339(),
            log.lottery_type,
            log.status.as_str(),
            log.records_merged,
            log.records_rejected,
            log.error_message
                .as_deref()
                .map(|e| format!(" ({})", e))
                .unwrap_or_default(),
        );
    }

    Ok(())
}
