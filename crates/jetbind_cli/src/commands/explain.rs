//! Explain command implementation.

use jetbind_core::{classify, ErrorKind, Status, Warning};
use serde::Serialize;

use super::OutputFormat;
use crate::error::{CliError, CliResult};

/// Classification of one status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    /// Raw code.
    pub code: i32,
    /// `success`, `warning` or `error`.
    pub class: &'static str,
    /// Condition name, when the code is a named one.
    pub name: Option<&'static str>,
    /// Short description.
    pub description: &'static str,
}

impl Explanation {
    /// Classifies `code`.
    pub fn of(code: i32) -> Self {
        match classify(code) {
            Status::Success => Self {
                code,
                class: "success",
                name: Some("Success"),
                description: "the call succeeded",
            },
            Status::Warning(w) => Self {
                code,
                class: "warning",
                name: w.name(),
                description: w.description(),
            },
            Status::Error(e) => Self {
                code,
                class: "error",
                name: e.name(),
                description: e.description(),
            },
        }
    }
}

/// Resolves a command-line argument to a code: either a number or the
/// name of a warning or error (case-insensitive).
pub fn parse_code(arg: &str) -> CliResult<i32> {
    if let Ok(code) = arg.parse::<i32>() {
        return Ok(code);
    }
    let matches = |name: Option<&str>| name.is_some_and(|n| n.eq_ignore_ascii_case(arg));
    Warning::ALL
        .iter()
        .find(|w| matches(w.name()))
        .map(|w| w.code())
        .or_else(|| {
            ErrorKind::ALL
                .iter()
                .find(|e| matches(e.name()))
                .map(|e| e.code())
        })
        .ok_or_else(|| CliError::UnknownCode(arg.to_string()))
}

/// Runs the explain command.
pub fn run(args: &[String], format: OutputFormat) -> CliResult<()> {
    let explanations = args
        .iter()
        .map(|arg| parse_code(arg).map(Explanation::of))
        .collect::<CliResult<Vec<_>>>()?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&explanations)?);
        }
        OutputFormat::Text => {
            for e in &explanations {
                println!(
                    "{:>6}  {:<7}  {:<36}  {}",
                    e.code,
                    e.class,
                    e.name.unwrap_or("-"),
                    e.description
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_decides_the_class() {
        assert_eq!(Explanation::of(0).class, "success");
        assert_eq!(Explanation::of(1004).class, "warning");
        assert_eq!(Explanation::of(-1605).class, "error");
    }

    #[test]
    fn named_codes_carry_their_name() {
        let e = Explanation::of(ErrorKind::KeyDuplicate.code());
        assert_eq!(e.name, Some("KeyDuplicate"));

        let w = Explanation::of(Warning::BufferTruncated.code());
        assert_eq!(w.name, Some("BufferTruncated"));
    }

    #[test]
    fn unnamed_codes_are_still_classified() {
        let e = Explanation::of(-987_654);
        assert_eq!(e.class, "error");
        assert_eq!(e.name, None);

        let w = Explanation::of(987_654);
        assert_eq!(w.class, "warning");
        assert_eq!(w.name, None);
    }

    #[test]
    fn names_resolve_case_insensitively() {
        assert_eq!(
            parse_code("keyduplicate").unwrap(),
            ErrorKind::KeyDuplicate.code()
        );
        assert_eq!(
            parse_code("ColumnNull").unwrap(),
            Warning::ColumnNull.code()
        );
        assert_eq!(parse_code("-1605").unwrap(), -1605);
        assert!(matches!(
            parse_code("NoSuchThing"),
            Err(CliError::UnknownCode(_))
        ));
    }
}
