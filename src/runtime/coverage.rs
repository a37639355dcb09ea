use tracing::info;

use crate::{
    errors::TryciError,
    utils::process::{DefaultFormatter, command_from_line, describe, run_and_capture},
};

/// Produces the textual coverage table of the last instrumented test run.
pub struct CoverageRuntime<'a> {
    command_line: &'a str,
}

impl<'a> CoverageRuntime<'a> {
    pub fn new(command_line: &'a str) -> Self {
        Self { command_line }
    }

    pub fn report_text(&self) -> Result<String, TryciError> {
        let command = command_from_line(self.command_line)?;
        let description = describe(&command);
        info!("collecting coverage with {}", description);
        let output = run_and_capture(command, &mut DefaultFormatter)?;
        if !output.status.success() {
            return Err(TryciError::RuntimeError(format!(
                "{} exited with {}:\n{}",
                description, output.status, output.stderr
            )));
        }
        Ok(output.stdout)
    }
}
