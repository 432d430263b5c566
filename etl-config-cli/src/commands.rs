//! Command handlers
//!
//! Each handler loads the configuration described by [`ConfigArgs`] and writes
//! its report to the given writer. Errors carry the file being resolved as
//! context.

use std::io::Write;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Table};
use etl_config::{
    ConfigOptions, Configuration, EtlConfigOptions, EtlConfiguration, VariableStore,
};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::cli::{Commands, ConfigArgs};

/// Shown in table cells without content.
const EMPTY_CELL: &str = "-";

/// Map command-line arguments onto resolver options.
pub fn options(args: &ConfigArgs) -> EtlConfigOptions {
    let mut base = ConfigOptions::new().with_variables(
        args.variables
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect::<VariableStore>(),
    );
    if let Some(dir) = &args.base_dir {
        base = base.with_base_dir(dir);
    }
    if let Some(dir) = &args.local_config_dir {
        base = base.with_local_config_dir(dir);
    }

    let options = EtlConfigOptions::new()
        .with_base(base)
        .with_overrides(args.overrides.iter().cloned());
    match &args.default_module {
        Some(module) => options.with_default_module_name(module),
        None => options,
    }
}

/// Load and fully resolve the configuration.
pub fn load(args: &ConfigArgs) -> Result<EtlConfiguration> {
    debug!("Resolving {}", args.file.display());
    EtlConfiguration::load(&args.file, options(args))
        .with_context(|| format!("Failed to resolve {}", args.file.display()))
}

/// Run a subcommand, writing its output to `out`.
pub fn run(command: &Commands, out: &mut dyn Write) -> Result<()> {
    let config = load(command.config())?;

    match command {
        Commands::Resolve { json, .. } => resolve(&config, *json, out),
        Commands::Action { name, section, .. } => action(&config, name, section.as_deref(), out),
        Commands::Endpoints { json, .. } => endpoints(&config, *json, out),
        Commands::Dump { compact, .. } => {
            writeln!(out, "{}", config.to_json(!compact)?)?;
            Ok(())
        }
    }
}

fn join_or_empty(names: &[&str]) -> String {
    if names.is_empty() {
        EMPTY_CELL.to_string()
    } else {
        names.join(", ")
    }
}

/// Sections with their enabled and disabled actions.
pub fn resolve(config: &EtlConfiguration, json: bool, out: &mut dyn Write) -> Result<()> {
    if json {
        let mut sections = Map::new();
        for section in config.section_names() {
            sections.insert(
                section.to_string(),
                json!({
                    "enabled": config.enabled_action_names(section).unwrap_or_default(),
                    "disabled": config.disabled_action_names(section).unwrap_or_default(),
                }),
            );
        }
        let report = json!({
            "file": config.filename().to_string_lossy(),
            "state": config.state(),
            "sections": sections,
            "endpoints": config.data_endpoints().len(),
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Section", "Enabled", "Disabled"]);

    for section in config.section_names() {
        let enabled = config.enabled_action_names(section).unwrap_or_default();
        let disabled = config.disabled_action_names(section).unwrap_or_default();
        table.add_row(vec![
            section.to_string(),
            join_or_empty(&enabled),
            join_or_empty(&disabled),
        ]);
    }

    writeln!(out, "{table}")?;
    writeln!(out, "{} data endpoints", config.data_endpoints().len())?;
    Ok(())
}

/// The resolved options of one action as pretty JSON.
pub fn action(
    config: &EtlConfiguration,
    name: &str,
    section: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    let options = config.action_options(name, section)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&options.to_value())?)?;
    Ok(())
}

/// Registered endpoints and the aliases pointing at them.
pub fn endpoints(config: &EtlConfiguration, json: bool, out: &mut dyn Write) -> Result<()> {
    let registry = config.data_endpoints();

    if json {
        let aliases: Map<String, Value> = registry
            .aliases()
            .map(|(alias, key)| (alias.to_string(), Value::String(key.to_string())))
            .collect();
        let endpoints: Vec<_> = registry.iter().map(|(_, endpoint)| endpoint).collect();
        let report = json!({"endpoints": endpoints, "aliases": aliases});
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Key", "Name", "Type", "Aliases"]);

    for (key, endpoint) in registry.iter() {
        let aliases: Vec<&str> = registry
            .aliases()
            .filter(|(_, target)| *target == key)
            .map(|(alias, _)| alias)
            .collect();
        table.add_row(vec![
            key.to_string(),
            endpoint.name.clone(),
            endpoint.endpoint_type.clone(),
            join_or_empty(&aliases),
        ]);
    }

    writeln!(out, "{table}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_config::{ConfigError, OptionOverride};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_config(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("etl.json");
        let content = json!({
            "paths": {"data_dir": "data"},
            "defaults": {
                "global": {"endpoints": {
                    "utility": {"type": "mysql", "name": "Utility", "config": "datawarehouse", "schema": "modw"}
                }},
                "ingestors": {"enabled": true}
            },
            "ingestors": [
                {"name": "jobs", "data_file": "${data_dir}/${site}.json"},
                {"name": "old", "enabled": false}
            ],
            "aggregators": [{"name": "jobs"}]
        });
        fs::write(&path, serde_json::to_string_pretty(&content).unwrap()).unwrap();
        path
    }

    fn args(file: &Path) -> ConfigArgs {
        ConfigArgs {
            file: file.to_path_buf(),
            base_dir: None,
            local_config_dir: None,
            default_module: None,
            overrides: Vec::new(),
            variables: vec![("site".to_string(), "ccr".to_string())],
        }
    }

    fn render(command: Commands) -> Result<String> {
        let mut out = Vec::new();
        run(&command, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_resolve_table() {
        let temp_dir = TempDir::new().unwrap();
        let file = write_config(temp_dir.path());

        let output = render(Commands::Resolve {
            config: args(&file),
            json: false,
        })
        .unwrap();
        assert!(output.contains("ingestors"));
        assert!(output.contains("aggregators"));
        assert!(output.contains("old"));
        assert!(output.contains("1 data endpoints"));
    }

    #[test]
    fn test_resolve_json() {
        let temp_dir = TempDir::new().unwrap();
        let file = write_config(temp_dir.path());

        let output = render(Commands::Resolve {
            config: args(&file),
            json: true,
        })
        .unwrap();
        let report: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(report["state"], "ready");
        assert_eq!(report["sections"]["ingestors"]["enabled"], json!(["jobs"]));
        assert_eq!(report["sections"]["ingestors"]["disabled"], json!(["old"]));
        assert_eq!(report["sections"]["aggregators"]["disabled"], json!(["jobs"]));
        assert_eq!(report["endpoints"], 1);
    }

    #[test]
    fn test_action_uses_variables_and_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let file = write_config(temp_dir.path());
        let mut config_args = args(&file);
        config_args.overrides = vec![OptionOverride::new("batch", "10")];

        let output = render(Commands::Action {
            config: config_args,
            name: "jobs".into(),
            section: Some("ingestors".into()),
        })
        .unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["name"], "jobs");
        assert_eq!(value["batch"], 10);
        assert_eq!(
            value["data_file"],
            json!(format!("{}/ccr.json", temp_dir.path().join("data").display()))
        );
        assert!(value["utility"].is_string());
    }

    #[test]
    fn test_default_module_qualifies_names() {
        let temp_dir = TempDir::new().unwrap();
        let file = write_config(temp_dir.path());
        let mut config_args = args(&file);
        config_args.default_module = Some("xdmod".into());

        let output = render(Commands::Resolve {
            config: config_args,
            json: true,
        })
        .unwrap();
        let report: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(
            report["sections"]["xdmod.ingestors"]["enabled"],
            json!(["xdmod.ingestors.jobs"])
        );
    }

    #[test]
    fn test_ambiguous_action_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let file = write_config(temp_dir.path());

        let err = render(Commands::Action {
            config: args(&file),
            name: "jobs".into(),
            section: None,
        })
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::AmbiguousAction { .. })
        ));
    }

    #[test]
    fn test_endpoints_json_lists_aliases() {
        let temp_dir = TempDir::new().unwrap();
        let file = write_config(temp_dir.path());

        let output = render(Commands::Endpoints {
            config: args(&file),
            json: true,
        })
        .unwrap();
        let report: Value = serde_json::from_str(&output).unwrap();
        let key = report["endpoints"][0]["key"].as_str().unwrap();
        assert_eq!(report["endpoints"][0]["type"], "mysql");
        assert_eq!(report["aliases"]["utility"], key);
    }

    #[test]
    fn test_missing_file_has_context() {
        let temp_dir = TempDir::new().unwrap();
        let err = render(Commands::Dump {
            config: args(&temp_dir.path().join("missing.json")),
            compact: true,
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to resolve"));
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::NotFound { .. })
        ));
    }
}
