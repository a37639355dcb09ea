use std::{
    path::Path,
    process::{Command, ExitStatus},
};

use tracing::{info, warn};

use crate::{
    cli::settings::{BranchSettings, DriverSettings},
    errors::TryciError,
    runtime::Backend,
    utils::process::{command_from_line, run_inherit},
};

/// One invocation of the unit-test runner script for a branch and backend.
#[derive(Debug, Clone, Copy)]
pub struct TestRun<'a> {
    pub branch: &'a BranchSettings,
    pub backend: Backend,
    pub output_dir: &'a Path,
    pub coverage: bool,
    pub failfast: bool,
}

impl TestRun<'_> {
    /// Name of the directory the runner writes its HTML coverage into.
    pub fn coverage_dir(&self) -> String {
        format!("{}-{}-coverage", self.branch.name, self.backend.name())
    }
}

pub struct UnitTestRuntime<'a> {
    driver: &'a DriverSettings,
}

impl<'a> UnitTestRuntime<'a> {
    pub fn new(driver: &'a DriverSettings) -> Self {
        Self { driver }
    }

    pub fn command(&self, run: &TestRun) -> Result<Command, TryciError> {
        let mut command = command_from_line(&self.driver.test_command)?;
        command.arg("--name").arg(&run.branch.name);
        command.arg("--config").arg(
            self.driver
                .config_dir
                .join(format!("{}.conf", run.backend.name())),
        );
        command.arg("--output").arg(run.output_dir);
        if let Some(nereid) = &run.branch.nereid {
            command.arg("--nereid").arg(nereid);
        }
        if run.failfast {
            command.arg("--failfast");
        }
        if run.coverage {
            command.arg("--coverage");
            command.arg("--coverage-dir").arg(run.coverage_dir());
        }
        command.env("PYTHONPATH", run.branch.python_path());
        Ok(command)
    }

    /// Runs the tests with the terminal attached. A failing suite is not an
    /// error here, the outcome is read back from the HTML report.
    pub fn run(&self, run: &TestRun) -> Result<ExitStatus, TryciError> {
        info!(
            "running unit tests of {} on {}",
            run.branch.name,
            run.backend.name()
        );
        let status = run_inherit(self.command(run)?)?;
        if !status.success() {
            warn!(
                "unit tests of {} on {} exited with {}",
                run.branch.name,
                run.backend.name(),
                status
            );
        }
        Ok(status)
    }
}
