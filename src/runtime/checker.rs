use std::{fs::File, io::BufReader, path::Path, process::Command};

use tracing::{debug, info};

use crate::{
    cli::settings::parse_ini,
    errors::TryciError,
    report::lint::{LintReport, LintResult},
    utils::{
        file_walking::module_directories,
        process::{CaptureOutput, DefaultFormatter, describe, run_and_capture},
    },
};

/// Style codes flake8 reports that Tryton code does not follow.
const FLAKE8_IGNORE: &str = "E120,E121,E123,E124,E126,E127,E128,W0232,R0903";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checker {
    Pyflakes,
    Flake8,
}

impl Checker {
    pub const ALL: [Checker; 2] = [Checker::Pyflakes, Checker::Flake8];

    pub fn name(&self) -> &'static str {
        match self {
            Checker::Pyflakes => "pyflakes",
            Checker::Flake8 => "flake8",
        }
    }

    pub fn command(&self, module_dir: &Path) -> Command {
        let mut command = Command::new(self.name());
        command.arg(module_dir);
        if let Checker::Flake8 = self {
            command.arg(format!("--ignore={}", FLAKE8_IGNORE));
        }
        command
    }

    /// Runs the checker over one module directory. Anything on stderr means
    /// the checker itself broke and is reported as an error.
    pub fn check_module(
        &self,
        module_dir: &Path,
        ignore: &[String],
    ) -> Result<LintResult, TryciError> {
        let command = self.command(module_dir);
        let description = describe(&command);
        let output = run_and_capture(command, &mut DefaultFormatter)?;
        lint_result(module_dir, &description, &output, ignore)
    }

    /// Checks every module below `modules_root` in name order.
    pub fn check_modules(
        &self,
        modules_root: &Path,
        ignore: &[String],
    ) -> Result<LintReport, TryciError> {
        info!("running {} on {}", self.name(), modules_root.display());
        let mut report = LintReport::default();
        for module_dir in module_directories(modules_root)? {
            report.push(self.check_module(&module_dir, ignore)?);
        }
        Ok(report)
    }
}

fn lint_result(
    module_dir: &Path,
    description: &str,
    output: &CaptureOutput,
    ignore: &[String],
) -> Result<LintResult, TryciError> {
    if !output.stderr.trim().is_empty() {
        debug!("{} stderr: {}", description, output.stderr);
        return Err(TryciError::RuntimeError(format!(
            "Exception executing {}:\n{}",
            description, output.stderr
        )));
    }
    let module = module_dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(LintResult::new(
        &module,
        &output.stdout,
        &hg_default_url(module_dir)?,
        ignore,
    ))
}

/// Repository a module was cloned from, taken from `[paths] default` in its
/// `.hg/hgrc`. Empty when the module is not a mercurial clone.
pub fn hg_default_url(module_dir: &Path) -> Result<String, TryciError> {
    let hgrc = module_dir.join(".hg").join("hgrc");
    if !hgrc.is_file() {
        return Ok(String::new());
    }
    let sections = parse_ini(BufReader::new(File::open(hgrc)?))?;
    Ok(sections
        .iter()
        .find(|(name, _)| name == "paths")
        .and_then(|(_, section)| section.get("default").cloned())
        .unwrap_or_default())
}
