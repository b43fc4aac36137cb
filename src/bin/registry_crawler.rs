use anyhow::{bail, Context};
use clap::Parser;
use dataverse_broker::adapters::{crawler::RegistryCrawler, loader};
use dataverse_broker::config::toml_config::{BrokerConfig, CrawlerConfig, DEFAULT_TIMEOUT_SECONDS};
use dataverse_broker::utils::{logger, validation::validate_url};
use dataverse_broker::CatalogRegistry;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "registry-crawler")]
#[command(about = "Discover dataverses on a server and write registry descriptors")]
struct Args {
    /// TOML configuration with a [crawler] section
    #[arg(short, long)]
    config: Option<String>,

    /// Dataverse server to search
    #[arg(long)]
    server_url: Option<String>,

    /// Short server name used as service id prefix
    #[arg(long)]
    alias: Option<String>,

    /// Stop after this many dataverses (0 = all)
    #[arg(long)]
    max_results: Option<usize>,

    #[arg(long)]
    per_page: Option<usize>,

    /// Directory receiving one <service_id>.json per dataverse
    #[arg(short, long)]
    output_dir: Option<String>,

    /// Print descriptors instead of writing them
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let (file_crawler, timeout) = match &args.config {
        Some(path) => {
            let config = BrokerConfig::from_file(path)
                .with_context(|| format!("failed to load config file '{}'", path))?;
            (config.crawler.clone(), config.verifier_timeout())
        }
        None => (None, Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)),
    };

    // 命令列參數優先於設定檔
    let crawler_config = CrawlerConfig {
        server_url: match args.server_url.clone() {
            Some(url) => url,
            None => match &file_crawler {
                Some(c) => c.server_url.clone(),
                None => bail!("--server-url or a [crawler] config section is required"),
            },
        },
        server_alias: match args.alias.clone() {
            Some(alias) => alias,
            None => match &file_crawler {
                Some(c) => c.server_alias.clone(),
                None => bail!("--alias or a [crawler] config section is required"),
            },
        },
        max_results: args
            .max_results
            .or(file_crawler.as_ref().and_then(|c| c.max_results)),
        per_page: args.per_page.or(file_crawler.as_ref().and_then(|c| c.per_page)),
        output_dir: args
            .output_dir
            .clone()
            .or(file_crawler.as_ref().map(|c| c.output_dir.clone()))
            .unwrap_or_else(|| "./whitelist".to_string()),
    };
    validate_url("server_url", &crawler_config.server_url)?;

    tracing::info!(
        "🔍 Crawling {} as '{}'",
        crawler_config.server_url,
        crawler_config.server_alias
    );
    let crawler = RegistryCrawler::from_config(&crawler_config, timeout)?;
    let descriptors = crawler.crawl().await.context("dataverse search failed")?;

    // 與 broker 啟動時相同的完整性與唯一性檢查
    CatalogRegistry::new(descriptors.clone()).context("crawled descriptors are not valid")?;

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }

    let written = loader::write_descriptors(&crawler_config.output_dir, &descriptors)?;
    tracing::info!(
        "✅ Wrote {} descriptors to {}",
        written.len(),
        crawler_config.output_dir
    );
    println!(
        "✅ Wrote {} descriptors to {}",
        written.len(),
        crawler_config.output_dir
    );

    Ok(())
}
