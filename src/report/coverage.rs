use std::{
    collections::BTreeMap,
    ffi::OsStr,
    fmt::Display,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::errors::TryciError;

use super::{Cell, HtmlTable, ReportConfig, RowClass, Thresholds, render_document};

/// One row of a `coverage report` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageLine {
    pub module_path: String,
    pub total_lines: u64,
    pub uncovered_lines: u64,
}

impl CoverageLine {
    /// A row claiming more uncovered than total lines carries no usable
    /// counts.
    pub fn is_consistent(&self) -> bool {
        self.uncovered_lines <= self.total_lines
    }

    pub fn covered_lines(&self) -> u64 {
        self.total_lines.saturating_sub(self.uncovered_lines)
    }
}

/// Directory of the module a file belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ModuleKey(String);

impl ModuleKey {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&Path> for ModuleKey {
    fn from(value: &Path) -> Self {
        Self(value.to_string_lossy().to_string())
    }
}

impl Display for ModuleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleRecord {
    pub total_lines: u64,
    pub covered_lines: u64,
    pub coverage_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub records: BTreeMap<ModuleKey, ModuleRecord>,
    pub total_lines: u64,
    pub total_covered: u64,
    pub overall_percent: f64,
}

/// Answers whether a directory holds a given file. Injected into the key
/// resolution so the walk can run against an in-memory layout.
pub trait DirectoryProbe {
    fn contains_file(&self, directory: &Path, file_name: &str) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl DirectoryProbe for FsProbe {
    fn contains_file(&self, directory: &Path, file_name: &str) -> bool {
        directory.join(file_name).exists()
    }
}

/// Nothing to cover counts as fully covered.
pub fn coverage_percent(covered: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        100.0 * covered as f64 / total as f64
    }
}

fn parse_line(line: &str) -> Option<CoverageLine> {
    let mut tokens = line.split_whitespace();
    let module_path = tokens.next()?;
    let total_lines = tokens.next()?.parse::<u64>().ok()?;
    let uncovered_lines = tokens.next()?.parse::<u64>().ok()?;
    Some(CoverageLine {
        module_path: module_path.to_string(),
        total_lines,
        uncovered_lines,
    })
    .filter(CoverageLine::is_consistent)
}

/// Extracts the rows of a textual coverage report that mention
/// `module_filter`. Headers, separators, footers and rows with non numeric
/// counters are dropped.
pub fn parse(raw_text: &str, module_filter: &str) -> Vec<CoverageLine> {
    raw_text
        .lines()
        .filter(|line| line.contains(module_filter))
        .filter_map(parse_line)
        .collect()
}

/// Walks up from the directory of `file_path` looking for the marker file.
///
/// Gives up when a directory named like the root sentinel is reached, when
/// more than `max_depth` parents have been visited or when the path runs out
/// of components.
pub fn resolve_module_key<P: DirectoryProbe + ?Sized>(
    file_path: &str,
    config: &ReportConfig,
    probe: &P,
) -> Option<ModuleKey> {
    let sentinel = OsStr::new(config.root_sentinel.as_str());
    let mut directory = Path::new(file_path).parent()?;
    let mut steps = 0;
    loop {
        if probe.contains_file(directory, &config.marker_file) {
            return Some(ModuleKey::from(directory));
        }
        if directory.file_name() == Some(sentinel) {
            return None;
        }
        steps += 1;
        if steps > config.max_depth {
            return None;
        }
        directory = directory.parent()?;
    }
}

fn saturating_sum(values: impl Iterator<Item = u64>) -> u64 {
    values.fold(0, u64::saturating_add)
}

pub fn aggregate<P: DirectoryProbe + ?Sized>(
    lines: &[CoverageLine],
    config: &ReportConfig,
    probe: &P,
) -> AggregateReport {
    // counts saturate at u64::MAX, which keeps the sums order independent
    // and covered <= total
    let mut totals: BTreeMap<ModuleKey, (u64, u64)> = BTreeMap::new();
    for line in lines.iter().filter(|line| line.is_consistent()) {
        let Some(key) = resolve_module_key(&line.module_path, config, probe) else {
            continue;
        };
        let entry = totals.entry(key).or_insert((0, 0));
        entry.0 = entry.0.saturating_add(line.total_lines);
        entry.1 = entry.1.saturating_add(line.covered_lines());
    }

    let total_lines = saturating_sum(totals.values().map(|(lines, _)| *lines));
    let total_covered = saturating_sum(totals.values().map(|(_, covered)| *covered));
    let records = totals
        .into_iter()
        .map(|(key, (lines, covered))| {
            (
                key,
                ModuleRecord {
                    total_lines: lines,
                    covered_lines: covered,
                    coverage_percent: coverage_percent(covered, lines),
                },
            )
        })
        .collect();

    AggregateReport {
        records,
        total_lines,
        total_covered,
        overall_percent: coverage_percent(total_covered, total_lines),
    }
}

fn validate(report: &AggregateReport) -> Result<(), TryciError> {
    if let Some((key, _)) = report
        .records
        .iter()
        .find(|(_, record)| record.covered_lines > record.total_lines)
    {
        return Err(TryciError::InvalidArgument(format!(
            "module {} has more covered than total lines",
            key
        )));
    }
    let lines = saturating_sum(report.records.values().map(|r| r.total_lines));
    let covered = saturating_sum(report.records.values().map(|r| r.covered_lines));
    if lines != report.total_lines || covered != report.total_covered {
        return Err(TryciError::InvalidArgument(format!(
            "report totals {}/{} do not match its modules {}/{}",
            report.total_covered, report.total_lines, covered, lines
        )));
    }
    Ok(())
}

pub fn render_html(
    report: &AggregateReport,
    title: &str,
    thresholds: &Thresholds,
) -> Result<String, TryciError> {
    validate(report)?;

    let mut table = HtmlTable::new(vec![
        Cell::text("Module"),
        Cell::text("Total Lines").right(),
        Cell::text("Covered Lines").right(),
        Cell::text("Coverage").right(),
    ]);
    for (key, record) in report.records.iter() {
        table.row(
            thresholds.classify(record.coverage_percent),
            vec![
                Cell::text(key.as_str()),
                Cell::text(record.total_lines.to_string()).right(),
                Cell::text(record.covered_lines.to_string()).right(),
                Cell::text(format!("{:.2}", record.coverage_percent)).right(),
            ],
        );
    }
    table.footer(vec![
        Cell::empty(),
        Cell::text(report.total_lines.to_string()).right(),
        Cell::text(report.total_covered.to_string()).right(),
        Cell::text(format!("{:.2}", report.overall_percent)).right(),
    ]);

    render_document(title, &table)
}

/// Parse, aggregate and render in one go, resolving module keys on the real
/// filesystem.
pub struct CoverageReporter<'a, P: DirectoryProbe = FsProbe> {
    config: &'a ReportConfig,
    probe: P,
}

impl<'a> CoverageReporter<'a, FsProbe> {
    pub fn new(config: &'a ReportConfig) -> Self {
        Self {
            config,
            probe: FsProbe,
        }
    }
}

impl<'a, P: DirectoryProbe> CoverageReporter<'a, P> {
    pub fn with_probe(config: &'a ReportConfig, probe: P) -> Self {
        Self { config, probe }
    }

    pub fn aggregate_text(&self, raw_text: &str) -> AggregateReport {
        let lines = parse(raw_text, &self.config.module_filter);
        aggregate(&lines, self.config, &self.probe)
    }

    pub fn classify(&self, record: &ModuleRecord) -> RowClass {
        self.config.thresholds.classify(record.coverage_percent)
    }

    pub fn render(&self, raw_text: &str, title: &str) -> Result<String, TryciError> {
        render_html(&self.aggregate_text(raw_text), title, &self.config.thresholds)
    }
}

/// Writes the report next to the other branch artifacts and returns its path.
pub fn write_report(
    output_dir: &Path,
    file_stem: &str,
    html: &str,
) -> Result<PathBuf, TryciError> {
    let path = output_dir.join(format!("{}.html", file_stem));
    std::fs::write(&path, html)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    struct MemoryProbe {
        markers: HashSet<PathBuf>,
    }

    impl MemoryProbe {
        fn new(module_dirs: &[&str]) -> Self {
            Self {
                markers: module_dirs
                    .iter()
                    .map(|dir| Path::new(dir).join("tryton.cfg"))
                    .collect(),
            }
        }
    }

    impl DirectoryProbe for MemoryProbe {
        fn contains_file(&self, directory: &Path, file_name: &str) -> bool {
            self.markers.contains(&directory.join(file_name))
        }
    }

    fn line(path: &str, total: u64, uncovered: u64) -> CoverageLine {
        CoverageLine {
            module_path: path.to_string(),
            total_lines: total,
            uncovered_lines: uncovered,
        }
    }

    fn config() -> ReportConfig {
        ReportConfig {
            module_filter: String::new(),
            ..ReportConfig::default()
        }
    }

    #[test]
    fn parse_coverage_report() {
        let output = r"
Name                                              Stmts   Miss  Cover
---------------------------------------------------------------------
/usr/lib/python2.7/dist-packages/six.py             400    200    50%
trytond/trytond/modules/account/account.py         1005     30    97%
trytond/trytond/modules/account/move.py              41      2    95%
trytond/trytond/modules/party/party.py               16      x    94%
trytond/trytond/modules/party/address.py
---------------------------------------------------------------------
TOTAL                                              1462    234    84%
";
        let lines = parse(output, "trytond");
        assert_eq!(
            lines,
            vec![
                line("trytond/trytond/modules/account/account.py", 1005, 30),
                line("trytond/trytond/modules/account/move.py", 41, 2),
            ]
        );
    }

    #[test]
    fn parse_tolerates_garbage() {
        assert!(parse("", "trytond").is_empty());
        assert!(parse("trytond", "trytond").is_empty());
        assert!(parse("trytond 5", "trytond").is_empty());
        assert!(parse("trytond -1 0", "trytond").is_empty());
        assert!(parse("trytond/a.py 1 2", "trytond").is_empty());
        assert!(parse("\0\u{fffd}trytond \t\t 3 1", "trytond").len() == 1);
    }

    #[test]
    fn resolve_key_in_file_directory() {
        let probe = MemoryProbe::new(&["pkg/a"]);
        assert_eq!(
            resolve_module_key("pkg/a/file1.py", &config(), &probe),
            Some(ModuleKey("pkg/a".to_string()))
        );
    }

    #[test]
    fn resolve_key_walks_to_ancestor() {
        let probe = MemoryProbe::new(&["src/modules/sale"]);
        assert_eq!(
            resolve_module_key("src/modules/sale/tests/unit/test_sale.py", &config(), &probe),
            Some(ModuleKey("src/modules/sale".to_string()))
        );
    }

    #[test]
    fn resolve_key_stops_at_root_sentinel() {
        let probe = MemoryProbe::new(&["checkout"]);
        assert_eq!(
            resolve_module_key("checkout/trytond/model/fields.py", &config(), &probe),
            None
        );
    }

    #[test]
    fn resolve_key_sentinel_with_marker_is_a_module() {
        let probe = MemoryProbe::new(&["checkout/trytond"]);
        assert_eq!(
            resolve_module_key("checkout/trytond/fields.py", &config(), &probe),
            Some(ModuleKey("checkout/trytond".to_string()))
        );
    }

    #[test]
    fn resolve_key_respects_depth_bound() {
        let probe = MemoryProbe::new(&["root"]);
        // five parents above the file directory
        assert_eq!(
            resolve_module_key("root/a/b/c/d/e/file.py", &config(), &probe),
            Some(ModuleKey("root".to_string()))
        );
        // six parents above the file directory
        assert_eq!(
            resolve_module_key("root/a/b/c/d/e/f/file.py", &config(), &probe),
            None
        );

        let shallow = ReportConfig {
            max_depth: 1,
            ..config()
        };
        assert_eq!(
            resolve_module_key("root/a/b/file.py", &shallow, &probe),
            None
        );
    }

    #[test]
    fn resolve_key_without_marker() {
        let probe = MemoryProbe::new(&[]);
        assert_eq!(resolve_module_key("a/b/file.py", &config(), &probe), None);
        assert_eq!(resolve_module_key("file.py", &config(), &probe), None);
        assert_eq!(resolve_module_key("", &config(), &probe), None);
    }

    #[test]
    fn aggregate_two_files_in_one_module() {
        let probe = MemoryProbe::new(&["pkg/a"]);
        let report = aggregate(
            &[line("pkg/a/file1.py", 100, 20), line("pkg/a/file2.py", 50, 0)],
            &config(),
            &probe,
        );
        let record = &report.records[&ModuleKey("pkg/a".to_string())];
        assert_eq!(record.total_lines, 150);
        assert_eq!(record.covered_lines, 130);
        assert_eq!(format!("{:.2}", record.coverage_percent), "86.67");
        assert_eq!(
            Thresholds::default().classify(record.coverage_percent),
            RowClass::Pass
        );
        assert_eq!(report.total_lines, 150);
        assert_eq!(report.total_covered, 130);
    }

    #[test]
    fn aggregate_isolates_modules_and_drops_unresolved() {
        let probe = MemoryProbe::new(&["pkg/a", "pkg/b"]);
        let report = aggregate(
            &[
                line("pkg/a/x.py", 10, 5),
                line("pkg/b/y.py", 20, 0),
                line("elsewhere/z.py", 1000, 1000),
            ],
            &config(),
            &probe,
        );
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[&ModuleKey("pkg/a".to_string())].covered_lines, 5);
        assert_eq!(report.records[&ModuleKey("pkg/b".to_string())].covered_lines, 20);
        assert_eq!(report.total_lines, 30);
        assert_eq!(report.total_covered, 25);
    }

    #[test]
    fn zero_lines_is_fully_covered() {
        let probe = MemoryProbe::new(&["pkg/empty"]);
        let report = aggregate(&[line("pkg/empty/__init__.py", 0, 0)], &config(), &probe);
        assert_eq!(
            report.records[&ModuleKey("pkg/empty".to_string())].coverage_percent,
            100.0
        );
        assert_eq!(report.overall_percent, 100.0);

        let empty = aggregate(&[], &config(), &probe);
        assert!(empty.records.is_empty());
        assert_eq!(empty.overall_percent, 100.0);
    }

    #[test]
    fn fully_covered_module_is_hundred_percent() {
        let probe = MemoryProbe::new(&["pkg/a"]);
        let report = aggregate(&[line("pkg/a/x.py", 37, 0)], &config(), &probe);
        assert_eq!(report.records[&ModuleKey("pkg/a".to_string())].coverage_percent, 100.0);
    }

    #[test]
    fn aggregate_is_order_independent() {
        let probe = MemoryProbe::new(&["pkg/a", "pkg/b"]);
        let mut lines = vec![
            line("pkg/a/1.py", 10, 3),
            line("pkg/b/2.py", 7, 7),
            line("pkg/a/3.py", 0, 0),
            line("pkg/b/4.py", 13, 1),
        ];
        let forward = aggregate(&lines, &config(), &probe);
        lines.reverse();
        let backward = aggregate(&lines, &config(), &probe);
        lines.swap(0, 2);
        let shuffled = aggregate(&lines, &config(), &probe);
        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn render_rows_sorted_with_totals() {
        let probe = MemoryProbe::new(&["pkg/b", "pkg/a", "pkg/c"]);
        let report = aggregate(
            &[
                line("pkg/c/x.py", 100, 61),
                line("pkg/b/x.py", 100, 60),
                line("pkg/a/x.py", 100, 20),
            ],
            &config(),
            &probe,
        );
        let html = render_html(&report, "Tryton unittest sqlite", &Thresholds::default()).unwrap();

        assert_eq!(html.matches("<table id=\"result_table\">").count(), 1);
        assert_eq!(html.matches("id=\"header_row\"").count(), 1);
        assert_eq!(html.matches("<tr class=").count(), 3);
        assert_eq!(html.matches("id=\"total_row\"").count(), 1);

        let a = html.find("<td>pkg/a</td>").unwrap();
        let b = html.find("<td>pkg/b</td>").unwrap();
        let c = html.find("<td>pkg/c</td>").unwrap();
        assert!(a < b && b < c);

        assert!(html.contains("<tr class=\"passClass\"><td>pkg/a</td>"));
        assert!(html.contains("<tr class=\"warnClass\"><td>pkg/b</td>"));
        assert!(html.contains("<tr class=\"errorClass\"><td>pkg/c</td>"));
        assert!(html.contains("<th align=\"right\">300</th><th align=\"right\">159</th><th align=\"right\">53.00</th>"));
    }

    #[test]
    fn render_rejects_inconsistent_report() {
        let probe = MemoryProbe::new(&["pkg/a"]);
        let mut report = aggregate(&[line("pkg/a/x.py", 10, 0)], &config(), &probe);
        report.total_lines = 11;
        assert!(matches!(
            render_html(&report, "t", &Thresholds::default()),
            Err(TryciError::InvalidArgument(_))
        ));

        let mut report = aggregate(&[line("pkg/a/x.py", 10, 0)], &config(), &probe);
        if let Some(record) = report.records.values_mut().next() {
            record.covered_lines = 12;
        }
        report.total_covered = 12;
        assert!(render_html(&report, "t", &Thresholds::default()).is_err());
    }

    #[test]
    fn reporter_resolves_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let module = dir.path().join("trytond").join("modules").join("party");
        std::fs::create_dir_all(module.join("tests")).unwrap();
        std::fs::write(module.join("tryton.cfg"), "[tryton]\n").unwrap();

        let raw = format!(
            "{}   40   10   75%\n{}   10   0   100%\n",
            module.join("party.py").display(),
            module.join("tests").join("test_party.py").display()
        );
        let config = ReportConfig::default();
        let reporter = CoverageReporter::new(&config);
        let report = reporter.aggregate_text(&raw);
        let record = &report.records[&ModuleKey::from(module.as_path())];
        assert_eq!(record.total_lines, 50);
        assert_eq!(record.covered_lines, 40);
        assert_eq!(reporter.classify(record), RowClass::Pass);

        let html = reporter.render(&raw, "coverage").unwrap();
        let path = write_report(dir.path(), "branch-sqlite-coverage", &html).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), html);
    }

    #[test]
    fn huge_counts_in_one_module_saturate() {
        let probe = MemoryProbe::new(&["trytond/a"]);
        let raw = "trytond/a/x.py 18446744073709551615 0 100%\ntrytond/a/y.py 1 0 100%\n";
        let report = aggregate(&parse(raw, "trytond"), &config(), &probe);
        let record = &report.records[&ModuleKey("trytond/a".to_string())];
        assert_eq!(record.total_lines, u64::MAX);
        assert_eq!(record.covered_lines, u64::MAX);
        assert_eq!(report.total_lines, u64::MAX);
        assert_eq!(report.total_covered, u64::MAX);
        assert!(render_html(&report, "t", &Thresholds::default()).is_ok());
    }

    #[test]
    fn huge_counts_in_two_modules_saturate_grand_totals() {
        let probe = MemoryProbe::new(&["trytond/a", "trytond/b"]);
        let raw = "trytond/a/x.py 18446744073709551615 5 99%\ntrytond/b/y.py 10 4 60%\n";
        let report = aggregate(&parse(raw, "trytond"), &config(), &probe);
        assert_eq!(report.records[&ModuleKey("trytond/b".to_string())].covered_lines, 6);
        assert_eq!(report.total_lines, u64::MAX);
        assert!(report.total_covered <= report.total_lines);
        assert!(render_html(&report, "t", &Thresholds::default()).is_ok());
    }

    #[test]
    fn aggregate_skips_inverted_lines() {
        let probe = MemoryProbe::new(&["pkg/a"]);
        let inverted = line("pkg/a/x.py", 3, 10);
        assert!(!inverted.is_consistent());
        assert_eq!(inverted.covered_lines(), 0);

        let report = aggregate(&[inverted, line("pkg/a/y.py", 4, 1)], &config(), &probe);
        let record = &report.records[&ModuleKey("pkg/a".to_string())];
        assert_eq!(record.total_lines, 4);
        assert_eq!(record.covered_lines, 3);
    }

    proptest! {
        #[test]
        fn parse_and_aggregate_never_panic(raw in any::<String>()) {
            let probe = MemoryProbe::new(&["trytond/modules/a"]);
            let lines = parse(&raw, "");
            let report = aggregate(&lines, &config(), &probe);
            prop_assert!(report.total_covered <= report.total_lines);
            prop_assert!(render_html(&report, "t", &Thresholds::default()).is_ok());
        }

        #[test]
        fn any_counts_aggregate_and_render(
            rows in proptest::collection::vec(
                (prop_oneof!["a", "b", "c/d"], any::<u64>(), any::<u64>()),
                0..20,
            )
        ) {
            let probe = MemoryProbe::new(&["trytond/a", "trytond/b"]);
            let raw: String = rows
                .iter()
                .map(|(dir, total, miss)| format!("trytond/{}/x.py {} {} 0%\n", dir, total, miss))
                .collect();
            let report = aggregate(&parse(&raw, "trytond"), &config(), &probe);
            prop_assert!(report.total_covered <= report.total_lines);
            for record in report.records.values() {
                prop_assert!(record.covered_lines <= record.total_lines);
            }
            prop_assert!(render_html(&report, "t", &Thresholds::default()).is_ok());
        }

        #[test]
        fn aggregate_survives_tabular_noise(
            rows in proptest::collection::vec(("[a-z/]{0,12}", "-?[0-9]{0,20}", "[0-9x]{0,20}"), 0..20)
        ) {
            let probe = MemoryProbe::new(&["trytond/a"]);
            let raw: String = rows
                .iter()
                .map(|(path, total, miss)| format!("trytond/{} {} {}\n", path, total, miss))
                .collect();
            let report = aggregate(&parse(&raw, "trytond"), &config(), &probe);
            prop_assert!(report.total_covered <= report.total_lines);
            prop_assert!(render_html(&report, "t", &Thresholds::default()).is_ok());
        }
    }
}
