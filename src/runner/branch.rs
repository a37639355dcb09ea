use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use colored::Colorize;
use tracing::{error, info, warn};

use crate::{
    cli::settings::{BranchSettings, Settings},
    errors::TryciError,
    report::{
        coverage::{CoverageReporter, write_report},
        lint,
        status::test_report_passed,
    },
    runtime::{
        Backend,
        checker::Checker,
        coverage::CoverageRuntime,
        unittest::{TestRun, UnitTestRuntime},
    },
};

use super::{
    Runner, RunnerConfig,
    notification::{Notification, public_link},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    /// The checkout is missing, nothing ran.
    Skipped,
    /// Only the checkers ran, no notification is composed.
    LintOnly,
    Tested { passed: bool },
    Failed(String),
}

impl BranchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            BranchOutcome::Failed(_) | BranchOutcome::Tested { passed: false }
        )
    }
}

/// Runs lint, unit tests and coverage for every configured branch in file
/// order, one after the other.
pub struct BranchRunner {
    settings: Settings,
    config: RunnerConfig,
}

impl BranchRunner {
    pub fn new(settings: Settings, config: RunnerConfig) -> Self {
        Self { settings, config }
    }

    fn selected_branches(&self) -> Result<Vec<&BranchSettings>, TryciError> {
        match &self.config.branch {
            Some(name) => self
                .settings
                .branch(name)
                .map(|branch| vec![branch])
                .ok_or(TryciError::UserError(format!(
                    "Branch '{}' is not configured",
                    name
                ))),
            None => Ok(self.settings.branches.iter().collect()),
        }
    }

    /// Runs one branch. Failures are turned into the error notification and
    /// never escape, so the remaining branches still run.
    pub fn run_branch(&self, branch: &BranchSettings, now: DateTime<Local>) -> BranchOutcome {
        let execution_name = format!("{} {}", now.format("%Y-%m-%d %H:%M:%S"), branch.name);
        info!("starting branch {}", branch.name);

        let output_dir = match resolve_output_dir(branch, now) {
            Ok(output_dir) => output_dir,
            Err(e) => {
                error!("branch {}: {}", branch.name, e);
                return BranchOutcome::Failed(e.to_string());
            }
        };
        let link = public_link(&self.settings.driver.public_url, &output_dir);

        if let Some(url) = &branch.url {
            warn!(
                "branch {}: fetching {} is not supported, using the configured checkout",
                branch.name, url
            );
        }
        if !branch.trytond.is_dir() {
            warn!(
                "trytond path '{}' not found. Ignoring branch {}",
                branch.trytond.display(),
                branch.name
            );
            return BranchOutcome::Skipped;
        }

        let (outcome, mut notification) = match self.execute(branch, &output_dir) {
            Ok(None) => return BranchOutcome::LintOnly,
            Ok(Some(true)) => (
                BranchOutcome::Tested { passed: true },
                Notification::success(&execution_name, &link),
            ),
            Ok(Some(false)) => (
                BranchOutcome::Tested { passed: false },
                Notification::failure(&execution_name),
            ),
            Err(e) => {
                error!("branch {}: {}", branch.name, e);
                (
                    BranchOutcome::Failed(e.to_string()),
                    Notification::error(&execution_name, &e, &link),
                )
            }
        };

        if let Err(e) = notification
            .attach_reports(&output_dir)
            .and_then(|_| notification.write(&output_dir))
        {
            error!("branch {}: could not write notification: {}", branch.name, e);
        }
        outcome
    }

    /// `None` when the unit tests were not requested.
    fn execute(
        &self,
        branch: &BranchSettings,
        output_dir: &Path,
    ) -> Result<Option<bool>, TryciError> {
        if self.config.lint {
            let modules_root = branch.trytond.join("trytond").join("modules");
            for checker in Checker::ALL {
                let report =
                    checker.check_modules(&modules_root, &self.settings.report.lint_ignore)?;
                info!(
                    "{} found {} issue(s) on branch {}",
                    checker.name(),
                    report.issue_count(),
                    branch.name
                );
                let title = format!("{} on branch {}", checker.name(), branch.name);
                write_report(
                    output_dir,
                    &format!("{}-{}", branch.name, checker.name()),
                    &lint::render_html(&report, &title)?,
                )?;
            }
        }
        if !self.config.unittest {
            return Ok(None);
        }

        let runtime = UnitTestRuntime::new(&self.settings.driver);
        let reporter = CoverageReporter::new(&self.settings.report);
        for backend in self.config.backends.iter() {
            let run = TestRun {
                branch,
                backend: *backend,
                output_dir,
                coverage: self.config.coverage,
                failfast: self.config.failfast,
            };
            runtime.run(&run)?;
            if self.config.coverage {
                let text = CoverageRuntime::new(&self.settings.driver.coverage_command)
                    .report_text()?;
                let title = format!("Tryton unittest {}", backend.name());
                let path = write_report(
                    output_dir,
                    &run.coverage_dir(),
                    &reporter.render(&text, &title)?,
                )?;
                info!("coverage report written to {}", path.display());
            }
        }
        Ok(Some(tests_passed(
            output_dir,
            &branch.name,
            &self.config.backends,
        )?))
    }
}

impl Runner for BranchRunner {
    fn run(&self) -> Result<(), TryciError> {
        let branches = self.selected_branches()?;
        let mut failed = vec![];
        for branch in branches {
            let outcome = self.run_branch(branch, Local::now());
            let status = match &outcome {
                BranchOutcome::Skipped => "skipped".yellow(),
                BranchOutcome::LintOnly => "lint only".normal(),
                BranchOutcome::Tested { passed: true } => "passed".green(),
                BranchOutcome::Tested { passed: false } => "failed".red(),
                BranchOutcome::Failed(_) => "error".red(),
            };
            println!("{}: {}", branch.name.bold(), status);
            if outcome.is_failure() {
                failed.push(branch.name.clone());
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(TryciError::RuntimeError(format!(
                "Failed branches: {}",
                failed.join(", ")
            )))
        }
    }
}

/// Output directory of a run, with a per-run timestamp subdirectory when the
/// branch asks for one. Created if missing.
pub fn resolve_output_dir(
    branch: &BranchSettings,
    now: DateTime<Local>,
) -> Result<PathBuf, TryciError> {
    let mut output_dir = branch.output_dir()?;
    if branch.add_timestamp {
        output_dir = output_dir.join(now.format("%Y-%m-%d_%H:%M:%S").to_string());
    }
    std::fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

/// Reads back the report the test runner wrote for each backend. A missing
/// report counts as a failure.
pub fn tests_passed(
    output_dir: &Path,
    branch: &str,
    backends: &[Backend],
) -> Result<bool, TryciError> {
    for backend in backends {
        let report = output_dir.join(format!("{}-{}.html", branch, backend.name()));
        if !report.is_file() {
            warn!("test report {} is missing", report.display());
            return Ok(false);
        }
        if !test_report_passed(&std::fs::read_to_string(&report)?)? {
            return Ok(false);
        }
    }
    Ok(true)
}
