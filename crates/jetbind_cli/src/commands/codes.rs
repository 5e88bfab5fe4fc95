//! Codes command implementation.

use jetbind_core::{ErrorKind, Warning};
use serde::Serialize;

use super::explain::Explanation;
use super::OutputFormat;
use crate::error::CliResult;

/// Every named condition, grouped by class.
#[derive(Debug, Default, Serialize)]
pub struct CodeTable {
    /// Named warnings.
    pub warnings: Vec<Explanation>,
    /// Named errors.
    pub errors: Vec<Explanation>,
}

impl CodeTable {
    /// Collects the requested classes.
    pub fn collect(warnings: bool, errors: bool) -> Self {
        let mut table = Self::default();
        if warnings {
            table.warnings = Warning::ALL
                .iter()
                .map(|w| Explanation::of(w.code()))
                .collect();
        }
        if errors {
            table.errors = ErrorKind::ALL
                .iter()
                .map(|e| Explanation::of(e.code()))
                .collect();
        }
        table
    }
}

/// Runs the codes command.
pub fn run(warnings: bool, errors: bool, format: OutputFormat) -> CliResult<()> {
    let table = CodeTable::collect(warnings, errors);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&table)?);
        }
        OutputFormat::Text => {
            print_section("Warnings", &table.warnings);
            print_section("Errors", &table.errors);
        }
    }
    Ok(())
}

fn print_section(title: &str, entries: &[Explanation]) {
    if entries.is_empty() {
        return;
    }
    println!("{title} ({}):", entries.len());
    for e in entries {
        println!(
            "  {:>6}  {:<36}  {}",
            e.code,
            e.name.unwrap_or("-"),
            e.description
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_named_condition_is_listed() {
        let table = CodeTable::collect(true, true);
        assert_eq!(table.warnings.len(), Warning::ALL.len());
        assert_eq!(table.errors.len(), ErrorKind::ALL.len());
        assert!(table.warnings.iter().all(|w| w.class == "warning"));
        assert!(table.errors.iter().all(|e| e.class == "error"));
        assert!(table.errors.iter().all(|e| e.name.is_some()));
    }

    #[test]
    fn classes_can_be_filtered() {
        let table = CodeTable::collect(false, true);
        assert!(table.warnings.is_empty());
        assert!(!table.errors.is_empty());
    }
}
