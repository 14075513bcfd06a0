//! Guessing which file a command refers to.
//!
//! Resolution never fails: an explicit reference is searched for in the
//! configured locations, then the ordered [`file_rules`] are tried against
//! the command, then a keyword table, then the first CSV in the documents
//! directory, and finally the configured default file, whether or not it
//! exists. The loader reports a missing file.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use heck::ToKebabCase;
use log::{debug, info, warn};
use regex::{Regex, RegexBuilder};

use crate::{config::Settings, io_utils};

/// What a matching rule turns into a file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget {
    /// The first capture group (or the whole match) names the file.
    Captured,
    /// The rule maps to a fixed file stem.
    Canonical(&'static str),
}

#[derive(Debug)]
pub struct FileRule {
    pub name: &'static str,
    regex: Regex,
    pub target: RuleTarget,
}

impl FileRule {
    fn new(name: &'static str, pattern: &str, target: RuleTarget) -> Self {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .expect("file rule pattern compiles");
        Self {
            name,
            regex,
            target,
        }
    }

    /// The file name this rule proposes for `command`, if it matches.
    pub fn candidate(&self, command: &str) -> Option<String> {
        let caps = self.regex.captures(command)?;
        let name = match self.target {
            RuleTarget::Canonical(stem) => return Some(format!("{stem}.csv")),
            RuleTarget::Captured => caps.get(1).or_else(|| caps.get(0))?.as_str(),
        };
        Some(normalize_file_name(name))
    }
}

/// Names that already carry an extension are kept; anything else is
/// kebab-cased and gets `.csv`.
fn normalize_file_name(name: &str) -> String {
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{}.csv", name.to_kebab_case())
    }
}

const NAMED: &str = r"(?:the\s+)?(?:file\s+)?(?:called\s+)?";

static FILE_RULES: LazyLock<Vec<FileRule>> = LazyLock::new(|| {
    use RuleTarget::{Canonical, Captured};
    vec![
        FileRule::new(
            "verb_with_extension",
            r#"\b(?:in|from|file|sheet|document|analyze|read|open|load)\s+["']?([^"'\s]+\.(?:csv|xlsx|xls|ods))["']?"#,
            Captured,
        ),
        FileRule::new(
            "quoted_with_extension",
            r#"["']([^"']+\.(?:csv|xlsx|xls|ods))["']"#,
            Captured,
        ),
        FileRule::new(
            "bare_with_extension",
            r"(\w+[-_]?\w*\.(?:csv|xlsx|xls|ods))",
            Captured,
        ),
        FileRule::new(
            "named_fortune500_payroll",
            &format!(r"{NAMED}(fortune500[-_]?payroll)"),
            Captured,
        ),
        FileRule::new(
            "named_global_sales",
            &format!(r"{NAMED}(global[-_]?sales)"),
            Captured,
        ),
        FileRule::new(
            "named_demo_payroll",
            &format!(r"{NAMED}(demo[-_]?payroll)"),
            Captured,
        ),
        FileRule::new(
            "named_ai_projects",
            &format!(r"{NAMED}(ai[-_]?projects)"),
            Captured,
        ),
        FileRule::new(
            "named_sample_budget",
            &format!(r"{NAMED}(sample[-_]?budget)"),
            Captured,
        ),
        FileRule::new(
            "fortune_500",
            r"fortune\s*500",
            Canonical("fortune500-payroll"),
        ),
        FileRule::new(
            "global_sales",
            r"global\s*sales",
            Canonical("global-sales"),
        ),
        FileRule::new(
            "payroll",
            r"payroll|employee\s*data",
            Canonical("demo-payroll"),
        ),
        FileRule::new(
            "ai_projects",
            r"ai\s*projects|artificial\s*intelligence",
            Canonical("ai-projects"),
        ),
        FileRule::new(
            "budget",
            r"budget|financial\s*data",
            Canonical("sample-budget"),
        ),
        FileRule::new(
            "sales_data",
            r"sales\s*data|revenue",
            Canonical("global-sales"),
        ),
    ]
});

/// The ordered extraction rules.
pub fn file_rules() -> &'static [FileRule] {
    &FILE_RULES
}

/// Substring keywords tried after every rule, in order.
pub const KEYWORD_FILES: &[(&str, &str)] = &[
    ("fortune", "fortune500-payroll.csv"),
    ("global", "global-sales.csv"),
    ("sales", "global-sales.csv"),
    ("payroll", "demo-payroll.csv"),
    ("ai", "ai-projects.csv"),
    ("budget", "sample-budget.csv"),
    ("revenue", "global-sales.csv"),
    ("compensation", "fortune500-payroll.csv"),
    ("employee", "demo-payroll.csv"),
];

/// Name variants tried for every rule candidate.
pub fn name_variants(name: &str) -> Vec<String> {
    let mut variants = vec![
        name.to_string(),
        format!("demo-{name}"),
        format!("sample-{name}"),
        name.replace('-', "_"),
        name.replace('_', "-"),
    ];
    let mut seen = HashSet::new();
    variants.retain(|v| seen.insert(v.clone()));
    variants
}

#[derive(Debug, Clone)]
pub struct FileLocator {
    documents_dir: PathBuf,
    fallback_dirs: Vec<PathBuf>,
    default_file: String,
}

impl FileLocator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            documents_dir: settings.documents_dir.clone(),
            fallback_dirs: settings.fallback_dirs.clone(),
            default_file: settings.default_file.clone(),
        }
    }

    /// Candidate paths for a bare file name, in search order.
    pub fn search_locations(&self, name: &str) -> Vec<PathBuf> {
        let mut locations = vec![self.documents_dir.join(name)];
        locations.extend(self.fallback_dirs.iter().map(|dir| dir.join(name)));
        locations.push(PathBuf::from(name));
        locations.push(self.documents_dir.join(format!("sample-{name}")));
        locations.push(self.documents_dir.join(format!("demo-{name}")));
        locations
    }

    /// First existing search location, or the primary location when none
    /// exists.
    pub fn resolve_name(&self, name: &str) -> PathBuf {
        self.find_existing(name)
            .unwrap_or_else(|| self.documents_dir.join(name))
    }

    fn find_existing(&self, name: &str) -> Option<PathBuf> {
        self.search_locations(name)
            .into_iter()
            .find(|path| path.is_file())
    }

    pub fn locate(&self, command: &str, explicit: Option<&str>) -> PathBuf {
        if let Some(reference) = explicit.map(str::trim).filter(|r| !r.is_empty()) {
            return self.resolve_name(reference);
        }
        info!("Extracting file reference from '{command}'");

        for rule in file_rules() {
            let Some(candidate) = rule.candidate(command) else {
                continue;
            };
            debug!("File rule '{}' proposed '{candidate}'", rule.name);
            if let Some(path) = name_variants(&candidate)
                .iter()
                .find_map(|variant| self.find_existing(variant))
            {
                info!("Rule '{}' resolved {path:?}", rule.name);
                return path;
            }
        }

        let lowered = command.to_lowercase();
        for (keyword, file) in KEYWORD_FILES {
            if lowered.contains(keyword)
                && let Some(path) = self.find_existing(file)
            {
                info!("Keyword '{keyword}' resolved {path:?}");
                return path;
            }
        }

        if let Some(path) = self.first_csv() {
            warn!("No specific file found, using first available CSV {path:?}");
            return path;
        }

        warn!(
            "No suitable file found, falling back to '{}'",
            self.default_file
        );
        self.resolve_name(&self.default_file)
    }

    fn first_csv(&self) -> Option<PathBuf> {
        let entries = fs::read_dir(&self.documents_dir).ok()?;
        let mut csv_files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_csv(path))
            .collect();
        csv_files.sort();
        csv_files.into_iter().next()
    }
}

fn is_csv(path: &Path) -> bool {
    io_utils::dotted_extension(path) == ".csv"
}
