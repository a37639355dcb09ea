use colored::Colorize;
use std::process::{Command, Stdio};
use tabled::{Table, Tabled, settings::Style};

use crate::{
    cli::settings::DriverSettings,
    errors::TryciError,
    runner::Runner,
    utils::process::command_from_line,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum DependencyStatus {
    Installed,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DependencyType {
    Required,
    Optional,
}

#[derive(Tabled)]
struct DependencyRow {
    #[tabled(rename = "Dependency")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Description")]
    description: String,
}

struct Dependency {
    name: String,
    command: Command,
    dep_type: DependencyType,
    description: &'static str,
}

impl Dependency {
    fn tool(name: &str, dep_type: DependencyType, description: &'static str) -> Self {
        let mut command = Command::new(name);
        command.arg("--version");
        Self {
            name: name.to_string(),
            command,
            dep_type,
            description,
        }
    }

    /// First word of a configured command line, probed with `--version`.
    fn configured(
        line: &str,
        dep_type: DependencyType,
        description: &'static str,
    ) -> Result<Self, TryciError> {
        let program = command_from_line(line)?
            .get_program()
            .to_string_lossy()
            .to_string();
        Ok(Self::tool(&program, dep_type, description))
    }

    fn check_status(&mut self) -> DependencyStatus {
        self.command
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| {
                if status.success() {
                    DependencyStatus::Installed
                } else {
                    DependencyStatus::Missing
                }
            })
            .unwrap_or(DependencyStatus::Missing)
    }

    fn label(&self, status: DependencyStatus) -> &'static str {
        match (status, self.dep_type) {
            (DependencyStatus::Installed, _) => FOUND,
            (DependencyStatus::Missing, DependencyType::Required) => MISSING,
            (DependencyStatus::Missing, DependencyType::Optional) => SKIPPABLE,
        }
    }

    fn to_row(&self, status: DependencyStatus) -> DependencyRow {
        DependencyRow {
            name: self.name.clone(),
            status: self.label(status).to_string(),
            description: self.description.to_string(),
        }
    }
}

const FOUND: &str = "found";
const MISSING: &str = "missing";
const SKIPPABLE: &str = "not found";

/// Colors the status column once the table is laid out, so ANSI codes do not
/// skew the column widths.
fn paint_statuses(table: &str) -> String {
    table
        .lines()
        .map(|line| {
            let cells: Vec<&str> = line.split('│').collect();
            match cells.get(2).map(|cell| cell.trim()) {
                Some(FOUND) => line.replacen(FOUND, &FOUND.green().to_string(), 1),
                Some(MISSING) => line.replacen(MISSING, &MISSING.red().to_string(), 1),
                Some(SKIPPABLE) => line.replacen(SKIPPABLE, &SKIPPABLE.yellow().to_string(), 1),
                _ => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prints which of the external tools a branch run needs are installed.
pub struct DependencyCheck {
    driver: DriverSettings,
}

impl DependencyCheck {
    pub fn new(driver: DriverSettings) -> Self {
        Self { driver }
    }

    fn dependencies(&self) -> Result<Vec<Dependency>, TryciError> {
        Ok(vec![
            Dependency::configured(
                &self.driver.test_command,
                DependencyType::Required,
                "Runs the unit test script",
            )?,
            Dependency::tool("pyflakes", DependencyType::Required, "Lint checker"),
            Dependency::tool("flake8", DependencyType::Required, "Style checker"),
            Dependency::configured(
                &self.driver.coverage_command,
                DependencyType::Optional,
                "Coverage report [Needed for --coverage]",
            )?,
        ])
    }
}

impl Runner for DependencyCheck {
    fn run(&self) -> Result<(), TryciError> {
        println!("{}", "External tools".bold());

        let mut all_required_installed = true;
        let mut rows = Vec::new();
        for mut dep in self.dependencies()? {
            let status = dep.check_status();
            if status == DependencyStatus::Missing && dep.dep_type == DependencyType::Required {
                all_required_installed = false;
            }
            rows.push(dep.to_row(status));
        }

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", paint_statuses(&table.to_string()));

        if all_required_installed {
            println!("\n{}", "Ready to run branches.".green());
        } else {
            println!(
                "\n{}",
                "pyflakes, flake8 and the test command must be on PATH before running branches."
                    .red()
            );
        }
        Ok(())
    }
}
