use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "dataverse-broker")]
#[command(about = "Service broker for Dataverse repositories")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "broker.toml")]
    pub config: String,

    /// Override broker.catalog_path from config
    #[arg(long)]
    pub catalog_path: Option<String>,

    /// Override broker.async from config
    #[arg(long = "async")]
    pub async_enabled: Option<bool>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the service catalog
    Catalog,
    /// Load and validate the registry, then exit
    Validate {
        /// Also check that every service's URL answers
        #[arg(long)]
        ping: bool,
    },
    /// Serve lifecycle requests as JSON lines on stdin/stdout
    Session,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_with_overrides() {
        let cli = CliConfig::try_parse_from([
            "dataverse-broker",
            "--config",
            "etc/broker.toml",
            "--catalog-path",
            "./whitelist",
            "--async",
            "true",
            "session",
        ])
        .unwrap();

        assert_eq!(cli.config, "etc/broker.toml");
        assert_eq!(cli.catalog_path.as_deref(), Some("./whitelist"));
        assert_eq!(cli.async_enabled, Some(true));
        assert!(matches!(cli.command, Command::Session));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(CliConfig::try_parse_from(["dataverse-broker"]).is_err());
    }

    #[test]
    fn test_parse_validate_with_ping() {
        let cli = CliConfig::try_parse_from(["dataverse-broker", "validate", "--ping"]).unwrap();
        assert!(matches!(cli.command, Command::Validate { ping: true }));

        let cli = CliConfig::try_parse_from(["dataverse-broker", "validate"]).unwrap();
        assert!(matches!(cli.command, Command::Validate { ping: false }));
    }
}
