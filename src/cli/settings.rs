use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use home::home_dir;

use crate::errors::TryciError;
use crate::report::{ReportConfig, Thresholds};

pub const DEFAULT_CONFIG_PATH: &str = "./tryton-tests.cfg";
/// Section holding driver and report options instead of a branch.
pub const SETTINGS_SECTION: &str = "tryci";

pub const DEFAULT_TEST_COMMAND: &str = "python test.py";
pub const DEFAULT_COVERAGE_COMMAND: &str = "coverage report";
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost";

pub type Section = HashMap<String, String>;

/// Parse an INI file into its sections, keeping file order. Keys are
/// lower-cased, `#` and `;` start comments, `=` or `:` separate key and value.
pub fn parse_ini<R: BufRead>(reader: R) -> Result<Vec<(String, Section)>, TryciError> {
    let mut sections: Vec<(String, Section)> = vec![];
    let mut current: Option<usize> = None;

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            let name = trimmed[1..trimmed.len() - 1].trim().to_string();
            current = match sections.iter().position(|(existing, _)| existing == &name) {
                Some(index) => Some(index),
                None => {
                    sections.push((name, HashMap::new()));
                    Some(sections.len() - 1)
                }
            };
            continue;
        }

        let separator = trimmed.find(['=', ':']).ok_or(TryciError::ConfigError(format!(
            "line {}: expected 'key = value', got '{}'",
            number + 1,
            trimmed
        )))?;
        let key = trimmed[..separator].trim().to_lowercase();
        let value = trimmed[separator + 1..].trim().to_string();
        if key.is_empty() {
            continue;
        }

        let index = current.ok_or(TryciError::ConfigError(format!(
            "line {}: '{}' appears before any [section] header",
            number + 1,
            key
        )))?;
        sections[index].1.insert(key, value);
    }

    Ok(sections)
}

fn parse_bool(value: &str) -> Result<bool, TryciError> {
    match value.to_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" | "" => Ok(false),
        other => Err(TryciError::ConfigError(format!(
            "'{}' is not a boolean",
            other
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(
    section: &Section,
    key: &str,
) -> Result<Option<T>, TryciError> {
    section
        .get(key)
        .map(|value| {
            value.parse::<T>().map_err(|_| {
                TryciError::ConfigError(format!("'{}' is not a valid value for {}", value, key))
            })
        })
        .transpose()
}

/// One checkout of the framework and its companion libraries.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchSettings {
    pub name: String,
    pub trytond: PathBuf,
    pub proteus: Option<PathBuf>,
    pub nereid: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub add_timestamp: bool,
    pub url: Option<String>,
}

impl BranchSettings {
    fn from_section(name: &str, section: &Section) -> Result<Self, TryciError> {
        let path = |key: &str| section.get(key).map(PathBuf::from);
        Ok(Self {
            name: name.to_string(),
            trytond: path("trytond").ok_or(TryciError::ConfigError(format!(
                "branch '{}' has no trytond path",
                name
            )))?,
            proteus: path("proteus"),
            nereid: path("nereid"),
            output: path("output"),
            add_timestamp: section
                .get("add_timestamp")
                .map(|v| parse_bool(v))
                .transpose()?
                .unwrap_or(false),
            url: section.get("url").cloned(),
        })
    }

    /// Directory the reports of this branch go to, `~/public_html` unless
    /// configured.
    pub fn output_dir(&self) -> Result<PathBuf, TryciError> {
        match &self.output {
            Some(output) => Ok(output.clone()),
            None => home_dir()
                .map(|home| home.join("public_html"))
                .ok_or(TryciError::ConfigError(format!(
                    "branch '{}' has no output and no home directory was found",
                    self.name
                ))),
        }
    }

    pub fn python_path(&self) -> String {
        std::iter::once(&self.trytond)
            .chain(self.proteus.iter())
            .chain(self.nereid.iter())
            .map(|p| p.to_string_lossy().to_string())
            .collect::<Vec<String>>()
            .join(":")
    }
}

/// How the external tools are invoked.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSettings {
    pub test_command: String,
    pub coverage_command: String,
    pub config_dir: PathBuf,
    pub public_url: String,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            test_command: DEFAULT_TEST_COMMAND.to_string(),
            coverage_command: DEFAULT_COVERAGE_COMMAND.to_string(),
            config_dir: PathBuf::from("."),
            public_url: DEFAULT_PUBLIC_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub branches: Vec<BranchSettings>,
    pub driver: DriverSettings,
    pub report: ReportConfig,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, TryciError> {
        let file = File::open(path).map_err(|e| {
            TryciError::ConfigError(format!("could not read {}: {}", path.display(), e))
        })?;
        Self::from_sections(parse_ini(BufReader::new(file))?)
    }

    pub fn from_sections(sections: Vec<(String, Section)>) -> Result<Self, TryciError> {
        let mut settings = Settings::default();
        for (name, section) in sections.iter() {
            if name == SETTINGS_SECTION {
                settings.driver = driver_settings(section);
                settings.report = report_config(section)?;
            } else {
                settings
                    .branches
                    .push(BranchSettings::from_section(name, section)?);
            }
        }
        Ok(settings)
    }

    pub fn branch(&self, name: &str) -> Option<&BranchSettings> {
        self.branches.iter().find(|branch| branch.name == name)
    }
}

fn driver_settings(section: &Section) -> DriverSettings {
    let defaults = DriverSettings::default();
    DriverSettings {
        test_command: section
            .get("test_command")
            .cloned()
            .unwrap_or(defaults.test_command),
        coverage_command: section
            .get("coverage_command")
            .cloned()
            .unwrap_or(defaults.coverage_command),
        config_dir: section
            .get("config_dir")
            .map(PathBuf::from)
            .unwrap_or(defaults.config_dir),
        public_url: section
            .get("public_url")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.public_url),
    }
}

fn report_config(section: &Section) -> Result<ReportConfig, TryciError> {
    let defaults = ReportConfig::default();
    let thresholds = Thresholds::new(
        parse_number(section, "pass_threshold")?.unwrap_or(defaults.thresholds.pass),
        parse_number(section, "warn_threshold")?.unwrap_or(defaults.thresholds.warn),
    )?;
    let mut lint_ignore = defaults.lint_ignore;
    if let Some(extra) = section.get("lint_ignore") {
        lint_ignore.extend(
            extra
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        );
    }
    Ok(ReportConfig {
        module_filter: section
            .get("module_filter")
            .cloned()
            .unwrap_or(defaults.module_filter),
        marker_file: section
            .get("marker_file")
            .cloned()
            .unwrap_or(defaults.marker_file),
        root_sentinel: section
            .get("root_sentinel")
            .cloned()
            .unwrap_or(defaults.root_sentinel),
        max_depth: parse_number(section, "max_depth")?.unwrap_or(defaults.max_depth),
        thresholds,
        lint_ignore,
    })
}
