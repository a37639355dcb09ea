use serde::Serialize;

use crate::errors::TryciError;

pub mod coverage;
pub mod lint;
pub mod status;

pub const DEFAULT_MODULE_FILTER: &str = "trytond";
pub const DEFAULT_MARKER_FILE: &str = "tryton.cfg";
pub const DEFAULT_ROOT_SENTINEL: &str = "trytond";
pub const DEFAULT_MAX_DEPTH: usize = 5;
pub const DEFAULT_PASS_THRESHOLD: f64 = 80.0;
pub const DEFAULT_WARN_THRESHOLD: f64 = 40.0;

const STYLE: &str = r#"
<style type="text/css" media="screen">
body        { font-family: verdana, arial, helvetica, sans-serif; font-size: 80%; }
table       { font-size: 100%; }
pre         { margin: 0; }

/* -- heading -------------------------------------------------------------- */
.heading {
    margin-top: 0ex;
    margin-bottom: 1ex;
}

/* -- report --------------------------------------------------------------- */
#result_table {
    width: 80%;
    border-collapse: collapse;
    border: medium solid #777;
}
#header_row {
    font-weight: bold;
    color: white;
    background-color: #777;
}
#result_table td {
    border: thin solid #777;
    padding: 2px;
}
#total_row  { font-weight: bold; }
.passClass  { background-color: #6c6; }
.warnClass  { background-color: #c60; }
.errorClass { background-color: #c00; }
</style>
"#;

/// Severity of a single report row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowClass {
    Pass,
    Warn,
    Error,
}

impl RowClass {
    pub fn css_class(&self) -> &'static str {
        match self {
            RowClass::Pass => "passClass",
            RowClass::Warn => "warnClass",
            RowClass::Error => "errorClass",
        }
    }
}

/// Coverage percentages at or above `pass` are passing, at or above `warn`
/// are warnings, everything below is an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub pass: f64,
    pub warn: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pass: DEFAULT_PASS_THRESHOLD,
            warn: DEFAULT_WARN_THRESHOLD,
        }
    }
}

impl Thresholds {
    pub fn new(pass: f64, warn: f64) -> Result<Self, TryciError> {
        if !(pass.is_finite() && warn.is_finite()) || warn > pass {
            return Err(TryciError::ConfigError(format!(
                "thresholds must satisfy warn <= pass, got warn={} pass={}",
                warn, pass
            )));
        }
        Ok(Self { pass, warn })
    }

    pub fn classify(&self, percent: f64) -> RowClass {
        if percent >= self.pass {
            RowClass::Pass
        } else if percent >= self.warn {
            RowClass::Warn
        } else {
            RowClass::Error
        }
    }
}

/// Everything the coverage and lint reports depend on. Built once from the
/// configuration file and shared by reference afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub module_filter: String,
    pub marker_file: String,
    pub root_sentinel: String,
    pub max_depth: usize,
    pub thresholds: Thresholds,
    pub lint_ignore: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            module_filter: DEFAULT_MODULE_FILTER.to_string(),
            marker_file: DEFAULT_MARKER_FILE.to_string(),
            root_sentinel: DEFAULT_ROOT_SENTINEL.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            thresholds: Thresholds::default(),
            lint_ignore: lint::DEFAULT_LINT_IGNORE
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    content: String,
    align: Align,
}

impl Cell {
    /// Plain text, escaped on render.
    pub fn text(content: impl AsRef<str>) -> Self {
        Self {
            content: escape_html(content.as_ref()),
            align: Align::Left,
        }
    }

    /// Preformatted block, escaped and wrapped in `<pre>`.
    pub fn pre(content: impl AsRef<str>) -> Self {
        Self {
            content: format!("<pre>{}</pre>", escape_html(content.as_ref())),
            align: Align::Left,
        }
    }

    pub fn empty() -> Self {
        Self::text("")
    }

    pub fn right(mut self) -> Self {
        self.align = Align::Right;
        self
    }

    fn render(&self, tag: &str) -> String {
        match self.align {
            Align::Left => format!("<{tag}>{}</{tag}>", self.content),
            Align::Right => format!("<{tag} align=\"right\">{}</{tag}>", self.content),
        }
    }
}

/// Result table shared by the coverage and lint reports: one header row, any
/// number of classified data rows, one footer row.
#[derive(Debug, Clone, PartialEq)]
pub struct HtmlTable {
    header: Vec<Cell>,
    rows: Vec<(RowClass, Vec<Cell>)>,
    footer: Vec<Cell>,
}

impl HtmlTable {
    pub fn new(header: Vec<Cell>) -> Self {
        Self {
            header,
            rows: vec![],
            footer: vec![],
        }
    }

    pub fn row(&mut self, class: RowClass, cells: Vec<Cell>) -> &mut Self {
        self.rows.push((class, cells));
        self
    }

    pub fn footer(&mut self, cells: Vec<Cell>) -> &mut Self {
        self.footer = cells;
        self
    }

    pub fn render(&self) -> Result<String, TryciError> {
        let width = self.header.len();
        if width == 0 {
            return Err(TryciError::InvalidArgument(
                "result table needs at least one column".to_string(),
            ));
        }
        if let Some((index, _)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, (_, cells))| cells.len() != width)
        {
            return Err(TryciError::InvalidArgument(format!(
                "row {} does not have {} columns",
                index, width
            )));
        }
        if self.footer.len() != width {
            return Err(TryciError::InvalidArgument(format!(
                "footer does not have {} columns",
                width
            )));
        }

        let mut table = String::from("<table id=\"result_table\">");
        table.push_str("<tr id=\"header_row\">");
        self.header
            .iter()
            .for_each(|cell| table.push_str(&cell.render("th")));
        table.push_str("</tr>");
        for (class, cells) in self.rows.iter() {
            table.push_str(&format!("<tr class=\"{}\">", class.css_class()));
            cells
                .iter()
                .for_each(|cell| table.push_str(&cell.render("td")));
            table.push_str("</tr>");
        }
        table.push_str("<tr id=\"total_row\">");
        self.footer
            .iter()
            .for_each(|cell| table.push_str(&cell.render("th")));
        table.push_str("</tr>");
        table.push_str("</table>");
        Ok(table)
    }
}

/// Wraps a rendered table into a standalone document with the embedded
/// stylesheet.
pub fn render_document(title: &str, table: &HtmlTable) -> Result<String, TryciError> {
    let mut html = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    html.push_str(STYLE);
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!("<h1 class=\"heading\">{}</h1>\n", escape_html(title)));
    html.push_str(&table.render()?);
    html.push_str("\n</body>\n</html>\n");
    Ok(html)
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
