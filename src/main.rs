use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use govbrief::models::{PersistedRecord, RecordFilter};
use govbrief::source::{feed_location, load_feed};
use govbrief::storage::sqlite::table_name_for;
use govbrief::utils::parse_run_date;
use govbrief::{
    build_provider, Config, DriverConfig, FigureChecker, GatewayConfig, GeminiProvider,
    HttpContentSource, LlmGateway, PipelineDriver, RecordStore, RetryLog, RunSummary, SqliteStore,
};

#[derive(Parser, Debug)]
#[command(name = "govbrief")]
#[command(version = "0.1.0")]
#[command(about = "Scrape a daily government URL feed and classify new content with an LLM")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Feed date in YYYY-MM-DD format (defaults to yesterday)
    #[arg(long, global = true)]
    date: Option<String>,

    /// Database path (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape the daily feed and classify new content
    Scrape {
        /// Feed URL or local CSV path (overrides FEED_URL_FORMAT)
        #[arg(long)]
        feed: Option<String>,
    },
    /// Re-fetch records that were stored without text
    RetryScrape,
    /// Re-submit records whose classification failed
    RetryLlm,
    /// Print records eligible for the report
    List {
        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("govbrief=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::from_env()?;

    let date = parse_run_date(args.date.as_deref())
        .map_err(|e| anyhow::anyhow!("Invalid --date (expected YYYY-MM-DD): {}", e))?;
    let database = args.database.clone().unwrap_or_else(|| config.database_path.clone());
    let table = table_name_for(&config.table_prefix, date);
    tracing::info!("Run date {} (table {})", date, table);

    let store = SqliteStore::new(&database, &table)?;

    let summary = match &args.command {
        Command::List { format, output } => {
            let records = store.fetch_by_predicate(RecordFilter::ReportEligible)?;
            output_records(&records, format, output.as_deref())?;
            None
        }
        Command::Scrape { feed } => {
            let location = match (feed, &config.feed_url_format) {
                (Some(feed), _) => feed.clone(),
                (None, Some(format)) => feed_location(format, date),
                (None, None) => anyhow::bail!("No feed given: pass --feed or set FEED_URL_FORMAT"),
            };
            let driver = build_driver(&config, &store)?;
            let entries = load_feed(&reqwest::Client::new(), &location).await?;
            Some(driver.run_scrape(&entries).await?)
        }
        Command::RetryScrape => Some(build_driver(&config, &store)?.run_scrape_retry().await?),
        Command::RetryLlm => Some(build_driver(&config, &store)?.run_llm_retry().await?),
    };

    store.close()?;
    if let Some(summary) = summary {
        print_summary(&summary);
    }

    Ok(())
}

/// Fails on a missing API key before anything is fetched.
fn build_driver<'a>(
    config: &Config,
    store: &'a SqliteStore,
) -> anyhow::Result<PipelineDriver<'a, HttpContentSource, GeminiProvider, SqliteStore>> {
    let provider = build_provider(config)?;
    let gateway = LlmGateway::new(provider, GatewayConfig::from(config))
        .with_fact_checker(FigureChecker::new());

    let today = chrono::Local::now().date_naive();
    Ok(PipelineDriver::new(
        HttpContentSource::new()?,
        gateway,
        store,
        RetryLog::new(&config.retry_log_path),
        DriverConfig::from_config(config, today),
    ))
}

fn print_summary(summary: &RunSummary) {
    println!("\n=== Run summary ({:?}) ===", summary.mode);
    println!("Processed:  {}", summary.processed);
    println!("Skipped:    {}", summary.skipped);
    println!("Failed:     {}", summary.failed);
    println!("Submitted:  {}", summary.submitted);
    println!("Classified: {}", summary.classified);
    println!("LLM errors: {}", summary.llm_errors);
    println!("Excluded:   {}", summary.excluded);
    println!("Drifted:    {}", summary.drifted);
    println!("Persisted:  {}", summary.persisted);
}

fn output_records(
    records: &[PersistedRecord],
    format: &str,
    path: Option<&str>,
) -> anyhow::Result<()> {
    let output = match format {
        "json" => serde_json::to_string_pretty(records)?,
        _ => format_text(records),
    };

    if let Some(path) = path {
        std::fs::write(path, &output)?;
        tracing::info!("Output written to: {}", path);
    } else {
        println!("{}", output);
    }

    Ok(())
}

fn format_text(records: &[PersistedRecord]) -> String {
    let mut output = format!("\n=== {} report-eligible records ===\n", records.len());

    for record in records {
        output.push_str(&format!("\n{}\n", record.url));
        output.push_str(&format!(
            "  is_new: {}  date: {}  type: {}\n",
            record.is_new,
            record
                .page_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            record.filetype.as_deref().unwrap_or("unknown")
        ));
        if let Some(category) = &record.category {
            output.push_str(&format!("  category: {}\n", category));
        }
        if let Some(summary) = &record.summary {
            output.push_str(&format!("  summary: {}\n", summary));
        }
    }

    output
}
