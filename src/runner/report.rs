use std::path::PathBuf;

use tracing::info;

use crate::{errors::TryciError, report::ReportConfig, report::coverage::CoverageReporter};

use super::Runner;

pub const DEFAULT_COVERAGE_TITLE: &str = "Tryton unittest coverage";

/// Renders an existing coverage report text without running any test.
pub struct CoverageFileRunner {
    input: PathBuf,
    output: Option<PathBuf>,
    title: String,
    json: bool,
    config: ReportConfig,
}

impl CoverageFileRunner {
    pub fn new(
        input: PathBuf,
        output: Option<PathBuf>,
        title: String,
        json: bool,
        config: ReportConfig,
    ) -> Self {
        Self {
            input,
            output,
            title,
            json,
            config,
        }
    }

    pub fn render(&self) -> Result<String, TryciError> {
        let raw_text = std::fs::read_to_string(&self.input)?;
        let reporter = CoverageReporter::new(&self.config);
        if self.json {
            Ok(serde_json::to_string_pretty(
                &reporter.aggregate_text(&raw_text),
            )?)
        } else {
            reporter.render(&raw_text, &self.title)
        }
    }
}

impl Runner for CoverageFileRunner {
    fn run(&self) -> Result<(), TryciError> {
        let rendered = self.render()?;
        match &self.output {
            Some(output) => {
                std::fs::write(output, rendered)?;
                info!("coverage report written to {}", output.display());
            }
            None => println!("{}", rendered),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::write_files;

    fn coverage_text(root: &std::path::Path) -> String {
        format!(
            "Name Stmts Miss Cover\n\
             {root}/trytond/modules/party/party.py 100 20 80%\n\
             {root}/trytond/modules/party/address.py 50 50 0%\n\
             {root}/trytond/modules/sale/sale.py 10 0 100%\n\
             TOTAL 160 70 56%\n",
            root = root.display()
        )
    }

    fn runner(root: &std::path::Path, output: Option<PathBuf>, json: bool) -> CoverageFileRunner {
        let text = coverage_text(root);
        write_files(
            root,
            &[
                ("trytond/modules/party/tryton.cfg", ""),
                ("trytond/modules/sale/tryton.cfg", ""),
                ("coverage.txt", text.as_str()),
            ],
        );
        CoverageFileRunner::new(
            root.join("coverage.txt"),
            output,
            DEFAULT_COVERAGE_TITLE.to_string(),
            json,
            ReportConfig::default(),
        )
    }

    #[test]
    fn json_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let rendered = runner(dir.path(), None, true).render().unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["total_lines"], 160);
        assert_eq!(value["total_covered"], 90);
        let party = dir.path().join("trytond/modules/party");
        assert_eq!(
            value["records"][party.to_string_lossy().as_ref()]["covered_lines"],
            80
        );
    }

    #[test]
    fn html_written_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("coverage.html");
        runner(dir.path(), Some(output.clone()), false).run().unwrap();
        let html = std::fs::read_to_string(output).unwrap();
        assert_eq!(html.matches("<table id=\"result_table\">").count(), 1);
        assert!(html.contains(DEFAULT_COVERAGE_TITLE));
        assert!(html.contains("56.25"));
    }

    #[test]
    fn missing_input_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CoverageFileRunner::new(
            dir.path().join("nope.txt"),
            None,
            DEFAULT_COVERAGE_TITLE.to_string(),
            false,
            ReportConfig::default(),
        );
        assert!(matches!(runner.render(), Err(TryciError::IoError(_))));
    }
}
