//! CLI definition for the etl-config command-line interface.
//!
//! This module only describes arguments; command behavior lives in
//! [`crate::commands`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use etl_config::OptionOverride;

/// etl-config - ETL pipeline configuration resolver
///
/// Resolves a top-level ETL configuration file, together with its local
/// configuration directory, and reports the result.
#[derive(Parser, Debug)]
#[command(name = "etl-config")]
#[command(version)]
#[command(about = "Resolve and inspect ETL pipeline configuration")]
pub struct Cli {
    /// Enable debug output to stderr
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// How to load the configuration; shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Top-level configuration file
    pub file: PathBuf,

    /// Directory relative paths and references are resolved against
    /// [default: directory of FILE]
    #[arg(long, value_name = "DIR")]
    pub base_dir: Option<PathBuf>,

    /// Directory of local configuration files to merge
    /// [default: paths.local_config_dir, or <FILE stem>.d]
    #[arg(long, value_name = "DIR")]
    pub local_config_dir: Option<PathBuf>,

    /// Module name for configurations that do not declare one
    #[arg(long, value_name = "NAME")]
    pub default_module: Option<String>,

    /// Override an option on every action (repeatable)
    #[arg(short = 'o', long = "override", value_name = "KEY=VALUE")]
    pub overrides: Vec<OptionOverride>,

    /// Define a ${NAME} variable (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_variable)]
    pub variables: Vec<(String, String)>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a configuration and list its sections and actions
    Resolve {
        #[command(flatten)]
        config: ConfigArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the resolved options of one action
    Action {
        #[command(flatten)]
        config: ConfigArgs,
        /// Action name
        name: String,
        /// Section to look in; required when the name is used in several
        #[arg(short, long)]
        section: Option<String>,
    },
    /// List registered data endpoints and global aliases
    Endpoints {
        #[command(flatten)]
        config: ConfigArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the resolved configuration document
    Dump {
        #[command(flatten)]
        config: ConfigArgs,
        /// Print on a single line
        #[arg(long)]
        compact: bool,
    },
}

impl Commands {
    pub fn config(&self) -> &ConfigArgs {
        match self {
            Commands::Resolve { config, .. }
            | Commands::Action { config, .. }
            | Commands::Endpoints { config, .. }
            | Commands::Dump { config, .. } => config,
        }
    }
}

/// Parse `NAME=VALUE`.
pub fn parse_variable(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_resolve_with_repeated_flags() {
        let cli = Cli::parse_from([
            "etl-config",
            "resolve",
            "etl.json",
            "-o",
            "enabled=true",
            "--override",
            "batch=10",
            "--var",
            "data_dir=/srv/data",
            "--base-dir",
            "/etc/etl",
            "--default-module",
            "xdmod",
        ]);
        assert!(!cli.debug);

        let Commands::Resolve { config, json } = cli.command else {
            panic!("expected resolve");
        };
        assert!(!json);
        assert_eq!(config.file, PathBuf::from("etl.json"));
        assert_eq!(config.base_dir, Some(PathBuf::from("/etc/etl")));
        assert_eq!(config.default_module.as_deref(), Some("xdmod"));
        assert_eq!(
            config.overrides,
            vec![
                OptionOverride::new("enabled", "true"),
                OptionOverride::new("batch", "10")
            ]
        );
        assert_eq!(
            config.variables,
            vec![("data_dir".to_string(), "/srv/data".to_string())]
        );
    }

    #[test]
    fn test_action_positionals_and_global_debug() {
        let cli = Cli::parse_from([
            "etl-config",
            "action",
            "etl.json",
            "jobs",
            "--section",
            "ingestors",
            "--debug",
        ]);
        assert!(cli.debug);
        let Commands::Action { config, name, section } = cli.command else {
            panic!("expected action");
        };
        assert_eq!(config.file, PathBuf::from("etl.json"));
        assert_eq!(name, "jobs");
        assert_eq!(section.as_deref(), Some("ingestors"));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        assert!(Cli::try_parse_from(["etl-config", "dump", "etl.json", "-o", "novalue"]).is_err());
        assert!(Cli::try_parse_from(["etl-config", "dump", "etl.json", "--var", "=x"]).is_err());
    }

    #[test]
    fn test_parse_variable() {
        assert_eq!(
            parse_variable("a=b=c"),
            Ok(("a".to_string(), "b=c".to_string()))
        );
        assert!(parse_variable("missing").is_err());
    }
}
