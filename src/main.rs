use anyhow::Context;
use clap::Parser;
use dataverse_broker::adapters::{loader, session};
use dataverse_broker::config::Command;
use dataverse_broker::utils::{logger, validation::Validate};
use dataverse_broker::{synthesize_catalog, Broker, BrokerConfig, CliConfig, HttpVerifier};
use std::sync::Arc;
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 載入配置
    let mut config = match BrokerConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if cli.json_logs || config.json_logging() {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::info!("🚀 Starting dataverse-broker");

    // 應用命令列覆蓋設定
    if let Some(path) = &cli.catalog_path {
        config.broker.catalog_path = Some(path.clone());
        tracing::info!("🔧 Catalog path overridden to: {}", path);
    }
    if let Some(async_enabled) = cli.async_enabled {
        config.broker.async_enabled = async_enabled;
        tracing::info!("🔧 Async mode overridden to: {}", async_enabled);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }
    if cli.verbose {
        tracing::debug!("Broker config: {:?}", config);
    }

    // registry 載入失敗時不可提供服務
    let catalog_path = config.catalog_path().unwrap_or_default().to_string();
    let registry = match loader::load_registry(&catalog_path) {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!("❌ Failed to load registry from {}: {}", catalog_path, e);
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    match cli.command {
        Command::Validate { ping } => {
            if ping {
                let verifier =
                    HttpVerifier::from_config(&config).context("failed to build HTTP client")?;
                let failures = loader::ping_registry(&registry, &verifier).await;
                if !failures.is_empty() {
                    for (service_id, e) in &failures {
                        eprintln!("❌ {}: {}", service_id, e);
                    }
                    std::process::exit(1);
                }
            }
            println!("✅ {} Dataverse services are valid", registry.len());
        }
        Command::Catalog => {
            let catalog = synthesize_catalog(&registry).context("catalog synthesis failed")?;
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        }
        Command::Session => {
            let verifier =
                HttpVerifier::from_config(&config).context("failed to build HTTP client")?;
            tracing::info!(
                "Verifier timeout set to {}s, async mode {}",
                config.timeout_seconds(),
                config.broker.async_enabled
            );
            let broker = Broker::new(Arc::new(registry), verifier, config);

            let handled = session::run_session(
                &broker,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await
            .context("session aborted")?;
            tracing::info!("✅ Session finished after {} requests", handled);
        }
    }

    Ok(())
}
