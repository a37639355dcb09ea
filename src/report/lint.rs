use crate::errors::TryciError;

use super::{Cell, HtmlTable, RowClass, render_document};

/// Checker messages that are expected on every Tryton module and never
/// reported.
pub const DEFAULT_LINT_IGNORE: &[&str] = &[
    "'suite' imported but unused",
    "used; unable to detect undefined names",
];

pub fn is_ignored(line: &str, ignore: &[String]) -> bool {
    ignore.iter().any(|pattern| line.contains(pattern.as_str()))
}

/// Drops blank lines and lines matching the ignore list.
pub fn filter_output(output: &str, ignore: &[String]) -> String {
    output
        .lines()
        .filter(|line| !line.trim().is_empty() && !is_ignored(line, ignore))
        .collect::<Vec<&str>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintResult {
    pub module: String,
    pub output: String,
    pub url: String,
}

impl LintResult {
    pub fn new(module: &str, raw_output: &str, url: &str, ignore: &[String]) -> Self {
        Self {
            module: module.to_string(),
            output: filter_output(raw_output, ignore),
            url: url.to_string(),
        }
    }

    /// Lint output has no warning tier.
    pub fn class(&self) -> RowClass {
        if self.output.is_empty() {
            RowClass::Pass
        } else {
            RowClass::Error
        }
    }

    pub fn issue_count(&self) -> usize {
        self.output.lines().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LintReport {
    pub results: Vec<LintResult>,
}

impl LintReport {
    pub fn push(&mut self, result: LintResult) {
        self.results.push(result);
    }

    pub fn issue_count(&self) -> usize {
        self.results.iter().map(|r| r.issue_count()).sum()
    }

    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.class() == RowClass::Pass)
    }
}

pub fn render_html(report: &LintReport, title: &str) -> Result<String, TryciError> {
    let mut table = HtmlTable::new(vec![
        Cell::text("Module"),
        Cell::text("Output"),
        Cell::text("URL"),
    ]);
    for result in report.results.iter() {
        table.row(
            result.class(),
            vec![
                Cell::text(&result.module),
                Cell::pre(&result.output),
                Cell::text(&result.url),
            ],
        );
    }
    table.footer(vec![
        Cell::text(format!("Modules: {}", report.results.len())),
        Cell::text(format!("Errors: {}", report.issue_count())),
        Cell::empty(),
    ]);
    render_document(title, &table)
}
