//! Diagnostics collected during a validation session and the reports built
//! from them.

use std::fmt;

use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};

/// 1-based position in the input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u64,
    pub column: u64,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

/// One diagnostic about the validated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reason {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xpath: Option<String>,
    pub severity: Severity,
}

impl Reason {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            xpath: None,
            severity,
        }
    }

    pub fn at(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    pub fn with_xpath(mut self, xpath: Option<String>) -> Self {
        self.xpath = xpath;
        self
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{location}: ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(xpath) = &self.xpath {
            write!(f, " [{xpath}]")?;
        }
        Ok(())
    }
}

/// Accumulates reasons for one session. Never aborts the parse; whether the
/// document passes is decided from what was collected.
#[derive(Debug, Default)]
pub struct DiagnosticsCollector {
    reasons: Vec<Reason>,
    warnings: usize,
    errors: usize,
    fatal_errors: usize,
}

impl DiagnosticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warning(
        &mut self,
        message: impl Into<String>,
        location: Option<Location>,
        xpath: Option<String>,
    ) {
        self.push(Reason::new(Severity::Warning, message).at(location).with_xpath(xpath));
    }

    pub fn error(
        &mut self,
        message: impl Into<String>,
        location: Option<Location>,
        xpath: Option<String>,
    ) {
        self.push(Reason::new(Severity::Error, message).at(location).with_xpath(xpath));
    }

    pub fn fatal(
        &mut self,
        message: impl Into<String>,
        location: Option<Location>,
        xpath: Option<String>,
    ) {
        self.push(Reason::new(Severity::Fatal, message).at(location).with_xpath(xpath));
    }

    pub fn push(&mut self, reason: Reason) {
        match reason.severity {
            Severity::Warning => self.warnings += 1,
            Severity::Error => self.errors += 1,
            Severity::Fatal => self.fatal_errors += 1,
        }
        self.reasons.push(reason);
    }

    pub fn reasons(&self) -> &[Reason] {
        &self.reasons
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn has_fatal(&self) -> bool {
        self.fatal_errors > 0
    }

    /// Warnings count against the document just like errors.
    pub fn is_clean(&self) -> bool {
        self.reasons.is_empty()
    }

    pub fn into_reasons(self) -> Vec<Reason> {
        self.reasons
    }
}

/// Summary and reasons of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub summary: String,
    pub reasons: Vec<Reason>,
}

impl ValidationReport {
    pub fn new(summary: impl Into<String>, reasons: Vec<Reason>) -> Self {
        Self {
            summary: summary.into(),
            reasons,
        }
    }

    /// Summary line followed by one line per reason.
    pub fn to_plain_text(&self) -> String {
        let mut text = self.summary.clone();
        for reason in &self.reasons {
            text.push('\n');
            text.push_str(&reason.to_string());
        }
        text
    }

    /// `<reasons>` document with one `<reason>` per diagnostic.
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<reasons>");
        for reason in &self.reasons {
            xml.push_str("<reason severity=\"");
            xml.push_str(match reason.severity {
                Severity::Warning => "warning",
                Severity::Error => "error",
                Severity::Fatal => "fatal",
            });
            xml.push_str("\">");
            if let Some(xpath) = &reason.xpath {
                xml.push_str("<xpath>");
                xml.push_str(&escape(xpath.as_str()));
                xml.push_str("</xpath>");
            }
            if let Some(location) = &reason.location {
                xml.push_str(&format!(
                    "<location line=\"{}\" column=\"{}\"/>",
                    location.line, location.column
                ));
            }
            xml.push_str("<message>");
            xml.push_str(&escape(reason.message.as_str()));
            xml.push_str("</message></reason>");
        }
        xml.push_str("</reasons>");
        xml
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_counts() {
        let mut collector = DiagnosticsCollector::new();
        assert!(collector.is_clean());

        collector.warning("unknown namespace", None, Some("/Order".to_string()));
        collector.error(
            "bad value",
            Some(Location { line: 3, column: 7 }),
            Some("/Order/Id".to_string()),
        );

        assert!(!collector.is_clean());
        assert_eq!(collector.warning_count(), 1);
        assert_eq!(collector.error_count(), 1);
        assert!(!collector.has_fatal());

        collector.fatal("not well-formed", None, None);
        assert!(collector.has_fatal());
        assert_eq!(collector.reasons().len(), 3);
    }

    #[test]
    fn test_plain_text_report() {
        let report = ValidationReport::new(
            "Document is not valid",
            vec![
                Reason::new(Severity::Error, "first")
                    .at(Some(Location { line: 2, column: 5 }))
                    .with_xpath(Some("/Order/Id".to_string())),
                Reason::new(Severity::Warning, "second"),
            ],
        );
        assert_eq!(
            report.to_plain_text(),
            "Document is not valid\nline 2, column 5: first [/Order/Id]\nsecond"
        );
    }

    #[test]
    fn test_xml_report_escapes() {
        let report = ValidationReport::new(
            "invalid",
            vec![Reason::new(Severity::Error, "Value '<a & b>' is bad").with_xpath(Some("/R".to_string()))],
        );
        let xml = report.to_xml();
        assert!(xml.starts_with("<reasons><reason severity=\"error\">"));
        assert!(xml.contains("<xpath>/R</xpath>"));
        assert!(xml.contains("&lt;a &amp; b&gt;"));
        assert!(xml.ends_with("</reasons>"));
    }

    #[test]
    fn test_json_report() {
        let report = ValidationReport::new(
            "invalid",
            vec![Reason::new(Severity::Error, "bad").at(Some(Location { line: 1, column: 2 }))],
        );
        let json = report.to_json().unwrap();
        let parsed: ValidationReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
        assert!(json.contains("\"severity\": \"error\""));
        assert!(!json.contains("xpath"));
    }
}
