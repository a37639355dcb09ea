use crate::{cli::settings::Settings, errors::TryciError};

use super::Runner;

/// Prints the configured branch names, one per line.
pub struct ListRunner {
    settings: Settings,
}

impl ListRunner {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn branch_names(&self) -> Vec<&str> {
        self.settings
            .branches
            .iter()
            .map(|branch| branch.name.as_str())
            .collect()
    }
}

impl Runner for ListRunner {
    fn run(&self) -> Result<(), TryciError> {
        for name in self.branch_names() {
            println!("{}", name);
        }
        Ok(())
    }
}
