use clap::{Args, Parser, Subcommand};
use iran_aqi::{
    derive_features, load_dataset, write_trend_csv, yearly_trend, AppConfig, AqiError,
    DatasetError, DayFetcher, FetchCoordinator, FetchSummary, JalaliDate, ReqwestTransport,
    RetryPolicy,
};
use log::{error, info, warn, LevelFilter};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "iran_aqi", about = "Iranian air-quality index downloader")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every day of the range into the parquet store
    Fetch(FetchArgs),
    /// Build yearly trend tables from the parquet store
    Process,
    /// Fetch, then process (the default)
    Run(FetchArgs),
}

#[derive(Args, Default)]
struct FetchArgs {
    /// First Jalali day, `YYYY/MM/DD` (overrides `START_DATE`)
    #[arg(long)]
    start: Option<JalaliDate>,
    /// Last Jalali day, inclusive (overrides `END_DATE`)
    #[arg(long)]
    end: Option<JalaliDate>,
    /// Requests allowed in flight at once (overrides `MAX_CONCURRENT`)
    #[arg(long)]
    concurrency: Option<usize>,
    /// Root of the parquet store (overrides `OUTPUT_DIR`)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl FetchArgs {
    fn apply(self, config: &mut AppConfig) -> Result<(), AqiError> {
        if let Some(start) = self.start {
            config.start_date = start;
        }
        if let Some(end) = self.end {
            config.end_date = end;
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrent = concurrency;
        }
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        config.validate()?;
        Ok(())
    }
}

async fn fetch(config: &AppConfig) -> Result<FetchSummary, AqiError> {
    let range = config.date_range()?;
    let transport = ReqwestTransport::new(
        config.base_url.as_str(),
        &config.headers,
        &config.cookies,
        config.request_timeout,
    )?;
    let fetcher = DayFetcher::new(transport, config.output_dir.clone(), RetryPolicy::default());
    let coordinator = FetchCoordinator::builder()
        .fetcher(fetcher)
        .max_concurrent(config.max_concurrent)
        .request_time(config.request_time.as_str())
        .region_type(config.region_type)
        .build();

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler: run to completion.
            std::future::pending::<()>().await;
        }
    };
    let summary = coordinator.run_until(&range, shutdown).await;
    info!("Fetch finished: {summary}");
    Ok(summary)
}

async fn process(config: &AppConfig) -> Result<(), AqiError> {
    let Some(df) = load_dataset(config.dataset_dir()).await? else {
        error!("No data to process");
        return Ok(());
    };
    let df = derive_features(df).map_err(DatasetError::from)?;

    for region in &config.plot_regions {
        match yearly_trend(&df, region)? {
            Some(mut trend) => {
                write_trend_csv(&config.plots_dir, region, &mut trend)?;
            }
            None => warn!("No data for region {region}"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AqiError> {
    dotenvy::dotenv().ok();
    pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;

    match cli.command.unwrap_or_else(|| Commands::Run(FetchArgs::default())) {
        Commands::Fetch(args) => {
            args.apply(&mut config)?;
            fetch(&config).await?;
        }
        Commands::Process => process(&config).await?,
        Commands::Run(args) => {
            args.apply(&mut config)?;
            info!("Starting data fetch");
            fetch(&config).await?;
            info!("Reading and processing data");
            process(&config).await?;
            info!("Pipeline completed");
        }
    }
    Ok(())
}
