use std::path::{Component, Path, PathBuf};

use tracing::info;

use crate::{errors::TryciError, report::escape_html, utils::file_walking::files_with_extension};

/// File the composed notification is written to inside the output directory.
pub const NOTIFICATION_FILE: &str = "notification.eml.html";

/// Result message of one branch run: a subject line, a short plain-text body
/// and every HTML report of the run as the rich part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub html: String,
}

impl Notification {
    pub fn success(execution_name: &str, link: &str) -> Self {
        Self {
            subject: format!("[Tests] Successful test execution {}", execution_name),
            body: format!("Check the output at {}", link),
            html: String::new(),
        }
    }

    pub fn failure(execution_name: &str) -> Self {
        Self {
            subject: format!("[Tests] Error executing test {}", execution_name),
            body: String::new(),
            html: String::new(),
        }
    }

    /// The branch did not finish, `error` is what stopped it.
    pub fn error(execution_name: &str, error: &TryciError, link: &str) -> Self {
        Self {
            subject: format!("[Tests] Error executing test {}", execution_name),
            body: format!("{}.\nMaybe there is any output at {}", error, link),
            html: String::new(),
        }
    }

    /// Appends the HTML reports found in `output_dir`, newest name first.
    pub fn attach_reports(&mut self, output_dir: &Path) -> Result<(), TryciError> {
        let mut reports = files_with_extension(output_dir, "html")?;
        reports.retain(|path| {
            path.file_name().and_then(|name| name.to_str()) != Some(NOTIFICATION_FILE)
        });
        for report in reports.iter().rev() {
            self.html.push_str(&format!(
                "<h1>{}</h1>",
                escape_html(&report.to_string_lossy())
            ));
            self.html.push_str(&std::fs::read_to_string(report)?);
        }
        Ok(())
    }

    pub fn render(&self) -> String {
        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\"/>\n<title>{}</title>\n</head>\n<body>\n<pre>{}</pre>\n{}\n</body>\n</html>\n",
            escape_html(&self.subject),
            escape_html(&self.body),
            self.html
        )
    }

    pub fn write(&self, output_dir: &Path) -> Result<PathBuf, TryciError> {
        let path = output_dir.join(NOTIFICATION_FILE);
        std::fs::write(&path, self.render())?;
        info!("{} (written to {})", self.subject, path.display());
        Ok(path)
    }
}

/// Public address of `output_dir`: the components below the last directory
/// whose name contains `html` are appended to `public_url`.
pub fn public_link(public_url: &str, output_dir: &Path) -> String {
    let components: Vec<String> = output_dir
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    let published = components
        .iter()
        .rposition(|name| name.contains("html"))
        .map(|index| &components[index + 1..])
        .unwrap_or(&[]);
    if published.is_empty() {
        format!("{}/", public_url)
    } else {
        format!("{}/{}", public_url, published.join("/"))
    }
}
