use crate::{errors::TryciError, runtime::Backend};

pub mod branch;
pub mod list;
pub mod notification;
pub mod report;

pub trait Runner {
    fn run(&self) -> Result<(), TryciError>;
}

/// What a branch run executes, fixed from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub branch: Option<String>,
    pub backends: Vec<Backend>,
    pub coverage: bool,
    pub lint: bool,
    pub unittest: bool,
    pub failfast: bool,
}

impl RunnerConfig {
    pub fn new(
        branch: Option<String>,
        backends: Vec<Backend>,
        coverage: bool,
        lint: bool,
        unittest: bool,
        failfast: bool,
    ) -> Self {
        Self {
            branch,
            backends,
            coverage,
            lint,
            unittest,
            failfast,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new(
            None,
            Backend::selected(false, false),
            false,
            true,
            true,
            false,
        )
    }
}
