//! Schema validation of produced documents
//!
//! Validation is a reporting step: failures are logged and returned, but they
//! never prevent a document from being written.

use crate::error::{Error, Result};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

/// Outcome of validating one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Whether the document is valid
    pub valid: bool,
    /// Validator output
    pub diagnostics: String,
}

impl ValidationReport {
    /// A passing report
    pub fn pass(diagnostics: impl Into<String>) -> Self {
        Self {
            valid: true,
            diagnostics: diagnostics.into(),
        }
    }

    /// A failing report
    pub fn fail(diagnostics: impl Into<String>) -> Self {
        Self {
            valid: false,
            diagnostics: diagnostics.into(),
        }
    }
}

/// Validates serialized XML against a schema
pub trait DocumentValidator {
    /// Validate `xml`; `Err` means the validator itself could not run
    fn validate(&self, xml: &str, schema: &Path) -> Result<ValidationReport>;
}

/// Validator backed by `xmllint --schema`
#[derive(Debug, Clone)]
pub struct XmllintValidator {
    program: PathBuf,
}

impl Default for XmllintValidator {
    fn default() -> Self {
        Self {
            program: PathBuf::from("xmllint"),
        }
    }
}

impl XmllintValidator {
    /// Use `xmllint` from `PATH`
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific executable
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

impl DocumentValidator for XmllintValidator {
    fn validate(&self, xml: &str, schema: &Path) -> Result<ValidationReport> {
        let mut child = Command::new(&self.program)
            .arg("--noout")
            .arg("--schema")
            .arg(schema)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::Resource(format!(
                    "Failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        // stdin is written while stdout and stderr are drained
        let stdin = child.stdin.take();
        let (written, output) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(xml.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            (writer.join(), output)
        });
        let output = output?;
        match written {
            Ok(Ok(())) => {}
            // the validator may stop reading once it has failed
            Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(Error::Resource(format!(
                    "Failed to write input to {}",
                    self.program.display()
                )))
            }
        }

        let mut diagnostics = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            if !diagnostics.is_empty() {
                diagnostics.push('\n');
            }
            diagnostics.push_str(stdout.trim());
        }

        Ok(if output.status.success() {
            ValidationReport::pass(diagnostics)
        } else {
            ValidationReport::fail(diagnostics)
        })
    }
}

/// Validate and log the outcome.
///
/// Returns the report, or `None` when the validator could not run.
pub fn report_validation(
    validator: &dyn DocumentValidator,
    xml: &str,
    schema: &Path,
) -> Option<ValidationReport> {
    match validator.validate(xml, schema) {
        Ok(report) if report.valid => {
            log::info!("Document is valid against {}", schema.display());
            Some(report)
        }
        Ok(report) => {
            log::warn!(
                "Document is not valid against {}:\n{}",
                schema.display(),
                report.diagnostics
            );
            Some(report)
        }
        Err(e) => {
            log::warn!("Validation skipped: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<ValidationReport>);

    impl DocumentValidator for Fixed {
        fn validate(&self, _xml: &str, _schema: &Path) -> Result<ValidationReport> {
            match &self.0 {
                Ok(report) => Ok(report.clone()),
                Err(e) => Err(Error::Resource(e.to_string())),
            }
        }
    }

    #[test]
    fn test_report_validation_passes_through() {
        let schema = Path::new("DI.xsd");
        let failing = Fixed(Ok(ValidationReport::fail("element x: not expected")));
        let report = report_validation(&failing, "<x/>", schema).unwrap();
        assert!(!report.valid);
        assert_eq!(report.diagnostics, "element x: not expected");

        let passing = Fixed(Ok(ValidationReport::pass("- validates")));
        assert!(report_validation(&passing, "<x/>", schema).unwrap().valid);
    }

    #[test]
    fn test_validator_failure_is_not_fatal() {
        let broken = Fixed(Err(Error::Resource("no xmllint".to_string())));
        assert_eq!(report_validation(&broken, "<x/>", Path::new("DI.xsd")), None);
    }

    #[test]
    fn test_missing_program() {
        let validator = XmllintValidator::new().with_program("/nonexistent/xmllint");
        let result = validator.validate("<x/>", Path::new("DI.xsd"));
        assert!(matches!(result, Err(Error::Resource(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_large_output_while_reading_input() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("echo-validator");
        std::fs::write(&program, "#!/bin/sh\ncat >&2\n").unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let xml = format!("<x>{}</x>", "a".repeat(1024 * 1024));
        let report = XmllintValidator::new()
            .with_program(&program)
            .validate(&xml, Path::new("DI.xsd"))
            .unwrap();
        assert!(report.valid);
        assert_eq!(report.diagnostics.len(), xml.len());
    }
}
