//! Config command implementation.

use std::path::Path;
use std::sync::Arc;

use jetbind_core::{Instance, InstanceConfig, ParamValue};
use jetbind_sim::SimEngine;
use serde::Serialize;

use super::OutputFormat;
use crate::error::CliResult;

/// One system parameter set by the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterEntry {
    /// Parameter name.
    pub param: String,
    /// Configured value.
    pub value: String,
    /// Value read back from a live instance, when `--apply` was given.
    pub applied: Option<String>,
}

/// Result of checking a configuration file.
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    /// Instance name.
    pub name: String,
    /// Parameters in the order they are applied.
    pub parameters: Vec<ParameterEntry>,
}

impl ConfigReport {
    /// True when every applied value matches the configured one.
    pub fn is_consistent(&self) -> bool {
        self.parameters
            .iter()
            .all(|p| p.applied.as_ref().map_or(true, |a| *a == p.value))
    }
}

fn render(value: &ParamValue) -> String {
    match value {
        ParamValue::Integer(v) => v.to_string(),
        ParamValue::Text(t) => t.clone(),
    }
}

/// Builds the report for `config`, optionally applying it to a simulated
/// instance and reading every parameter back.
pub fn check(config: &InstanceConfig, apply: bool) -> CliResult<ConfigReport> {
    config.validate()?;

    let instance = if apply {
        Some(Instance::new(Arc::new(SimEngine::new()), config)?)
    } else {
        None
    };

    let mut parameters = Vec::new();
    for (param, value) in config.parameters() {
        let applied = match &instance {
            Some(instance) => Some(render(&instance.parameter(param)?)),
            None => None,
        };
        parameters.push(ParameterEntry {
            param: format!("{param:?}"),
            value: render(&value),
            applied,
        });
    }

    Ok(ConfigReport {
        name: config.name.clone(),
        parameters,
    })
}

/// Runs the config command.
pub fn run(path: &Path, apply: bool, format: OutputFormat) -> CliResult<()> {
    tracing::debug!(?path, apply, "checking instance configuration");
    let config = InstanceConfig::from_json_file(path)?;
    let report = check(&config, apply)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("Instance: {}", report.name);
            if report.parameters.is_empty() {
                println!("  (engine defaults only)");
            }
            for p in &report.parameters {
                match &p.applied {
                    Some(applied) if *applied != p.value => {
                        println!("  {:<22} {}  (engine reports {applied})", p.param, p.value)
                    }
                    _ => println!("  {:<22} {}", p.param, p.value),
                }
            }
            if apply && report.is_consistent() {
                println!();
                println!("✓ Every parameter was applied");
            }
        }
    }
    Ok(())
}
