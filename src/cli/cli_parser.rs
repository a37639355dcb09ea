use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::debug;

use crate::{
    errors::TryciError,
    logging::{DEFAULT_LOG_FILE, init_logging},
    runner::{
        Runner, RunnerConfig,
        branch::BranchRunner,
        list::ListRunner,
        report::{CoverageFileRunner, DEFAULT_COVERAGE_TITLE},
    },
    runtime::Backend,
};

use super::{
    dependency_check::DependencyCheck,
    settings::{DEFAULT_CONFIG_PATH, Settings},
};

#[derive(Parser, Debug)]
#[command(version, about = "Runs lint, unit tests and coverage over Tryton checkouts", long_about = None)]
struct Cli {
    #[arg(long, short, help = "Run only this branch")]
    branch: Option<String>,

    #[arg(long, short, default_value_t = false, help = "List configured branches")]
    list: bool,

    #[arg(long, short, default_value_t = false, help = "Run tests on SQLite only")]
    sqlite_only: bool,

    #[arg(
        long,
        short,
        default_value_t = false,
        help = "Run tests on PostgreSQL only"
    )]
    pgsql_only: bool,

    #[arg(long, short, default_value_t = false, help = "Collect coverage")]
    coverage: bool,

    #[arg(long, short, default_value_t = false, help = "Run the checkers only")]
    flakes_only: bool,

    #[arg(long, short, default_value_t = false, help = "Skip the checkers")]
    unittest_only: bool,

    #[arg(long, default_value_t = false, help = "Stop at the first failing test")]
    failfast: bool,

    #[arg(long, default_value = DEFAULT_CONFIG_PATH, help = "Branch configuration file")]
    config: PathBuf,

    #[arg(long, short, default_value_t = false)]
    verbose: bool,

    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    #[arg(
        long,
        default_value_t = false,
        help = "Check that the external tools are installed"
    )]
    check_dependencies: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render the output of `coverage report` as an HTML table
    Coverage {
        #[arg(long, short)]
        input: PathBuf,

        #[arg(long, short)]
        output: Option<PathBuf>,

        #[arg(long, short, default_value = DEFAULT_COVERAGE_TITLE)]
        title: String,

        #[arg(long, default_value_t = false, help = "Print the aggregate as JSON")]
        json: bool,
    },
}

impl Cli {
    fn runner_config(&self) -> RunnerConfig {
        RunnerConfig::new(
            self.branch.clone(),
            Backend::selected(self.sqlite_only, self.pgsql_only),
            self.coverage,
            !self.unittest_only,
            !self.flakes_only,
            self.failfast,
        )
    }
}

/// The branch file is only mandatory when branches are run or listed.
fn optional_settings(path: &Path) -> Result<Settings, TryciError> {
    if path.exists() {
        Settings::load(path)
    } else {
        Ok(Settings::default())
    }
}

fn build_runner(cli: Cli) -> Result<Box<dyn Runner>, TryciError> {
    if let Some(Commands::Coverage {
        input,
        output,
        title,
        json,
    }) = cli.command
    {
        let settings = optional_settings(&cli.config)?;
        return Ok(Box::new(CoverageFileRunner::new(
            input,
            output,
            title,
            json,
            settings.report,
        )));
    }
    if cli.check_dependencies {
        let settings = optional_settings(&cli.config)?;
        return Ok(Box::new(DependencyCheck::new(settings.driver)));
    }

    let settings = Settings::load(&cli.config)?;
    debug!("loaded {} branch(es) from {}", settings.branches.len(), cli.config.display());
    if cli.list {
        return Ok(Box::new(ListRunner::new(settings)));
    }
    let config = cli.runner_config();
    Ok(Box::new(BranchRunner::new(settings, config)))
}

pub fn parse_cli() -> Result<Box<dyn Runner>, TryciError> {
    let cli = Cli::parse();
    let log_file = init_logging(&cli.log_file, cli.verbose)?;
    debug!("logging to {}", log_file.display());
    build_runner(cli)
}
