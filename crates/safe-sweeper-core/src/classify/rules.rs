use crate::model::{CandidateItem, ClassificationVerdict, ItemKind, RiskTier, VerdictSource};
use chrono::Utc;
use glob::Pattern;
use std::path::{Path, PathBuf};

const MIB: u64 = 1024 * 1024;

/// One entry in the built-in rule table. A rule matches when every criterion
/// it defines holds: exclusions first, then path segments (any), then
/// file-name globs (any, files only), then size and age bounds.
pub struct Rule {
    pub name: &'static str,
    pub tier: RiskTier,
    pub description: &'static str,
    path_segments: &'static [&'static str],
    name_globs: Vec<Pattern>,
    exclude_segments: &'static [&'static str],
    min_size: Option<u64>,
    max_size: Option<u64>,
    max_age_days: Option<i64>,
}

impl Rule {
    fn new(
        name: &'static str,
        tier: RiskTier,
        description: &'static str,
        path_segments: &'static [&'static str],
        name_patterns: &'static [&'static str],
        exclude_segments: &'static [&'static str],
        min_size: Option<u64>,
        max_size: Option<u64>,
        max_age_days: Option<i64>,
    ) -> Rule {
        let name_globs = name_patterns
            .iter()
            .map(|p| Pattern::new(p).expect("built-in glob pattern must compile"))
            .collect();
        Rule {
            name,
            tier,
            description,
            path_segments,
            name_globs,
            exclude_segments,
            min_size,
            max_size,
            max_age_days,
        }
    }

    fn matches(&self, item: &CandidateItem) -> bool {
        let segments = lower_segments(&item.path);

        if self
            .exclude_segments
            .iter()
            .any(|ex| segments.iter().any(|s| s.contains(ex)))
        {
            return false;
        }

        if !self.path_segments.is_empty() {
            let hit = self
                .path_segments
                .iter()
                .any(|wanted| segments.iter().any(|s| s.contains(wanted)));
            return hit && self.size_condition(item) && self.age_condition(item);
        }

        if !self.name_globs.is_empty() {
            if item.kind != ItemKind::File {
                return false;
            }
            let file_name = item
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            let hit = self.name_globs.iter().any(|g| g.matches(&file_name));
            return hit && self.size_condition(item) && self.age_condition(item);
        }

        // Size/age-only rules must define at least one bound.
        if self.min_size.is_none() && self.max_size.is_none() && self.max_age_days.is_none() {
            return false;
        }
        self.size_condition(item) && self.age_condition(item)
    }

    fn size_condition(&self, item: &CandidateItem) -> bool {
        if let Some(min) = self.min_size {
            if item.size < min {
                return false;
            }
        }
        if let Some(max) = self.max_size {
            if item.size > max {
                return false;
            }
        }
        true
    }

    fn age_condition(&self, item: &CandidateItem) -> bool {
        match self.max_age_days {
            None => true,
            Some(days) => match item.last_modified {
                // No timestamp collected: treat as recent, the cautious read.
                None => false,
                Some(ts) => (Utc::now() - ts).num_days() >= days,
            },
        }
    }
}

lazy_static::lazy_static! {
    static ref BUILT_IN_RULES: Vec<Rule> = built_in_rules();
}

fn built_in_rules() -> Vec<Rule> {
    vec![
        // ── dangerous (checked first: most severe match wins) ──
        Rule::new(
            "system-directories",
            RiskTier::Dangerous,
            "system-critical directory",
            &["system32", "syswow64", "etc", "boot"],
            &[],
            &[],
            None,
            None,
            None,
        ),
        Rule::new(
            "drivers",
            RiskTier::Dangerous,
            "driver payload",
            &["drivers", "driverstore"],
            &[],
            &[],
            None,
            None,
            None,
        ),
        Rule::new(
            "user-document-directories",
            RiskTier::Dangerous,
            "common user-content directory",
            &["documents", "desktop", "downloads", "pictures", "music", "videos"],
            &[],
            &[],
            None,
            None,
            None,
        ),
        Rule::new(
            "executables",
            RiskTier::Dangerous,
            "executable or system binary",
            &[],
            &["*.exe", "*.dll", "*.sys", "*.so", "*.dylib", "*.bat", "*.cmd", "*.ps1", "*.sh"],
            &[],
            None,
            None,
            None,
        ),
        Rule::new(
            "registry-exports",
            RiskTier::Dangerous,
            "registry export",
            &[],
            &["*.reg"],
            &[],
            None,
            None,
            None,
        ),
        Rule::new(
            "oversized-items",
            RiskTier::Dangerous,
            "item larger than 100 MiB; may hold irreplaceable data",
            &[],
            &[],
            &[],
            Some(100 * MIB),
            None,
            None,
        ),
        // ── suspicious ──
        Rule::new(
            "config-files",
            RiskTier::Suspicious,
            "small configuration file",
            &[],
            &["*.ini", "*.conf", "*.json", "*.xml", "*.yaml", "*.yml"],
            &[],
            None,
            Some(10 * 1024),
            None,
        ),
        Rule::new(
            "data-directories",
            RiskTier::Suspicious,
            "directory likely holding user data",
            &["data", "userdata"],
            &[],
            &["cache"],
            None,
            None,
            None,
        ),
        Rule::new(
            "database-files",
            RiskTier::Suspicious,
            "database file outside a cache",
            &[],
            &["*.db", "*.sqlite", "*.sqlite3"],
            &["cache"],
            None,
            None,
            None,
        ),
        Rule::new(
            "documents",
            RiskTier::Suspicious,
            "document file",
            &[],
            &["*.doc", "*.docx", "*.xls", "*.xlsx", "*.ppt", "*.pdf"],
            &["logs"],
            None,
            None,
            None,
        ),
        Rule::new(
            "mid-size-unknown",
            RiskTier::Suspicious,
            "mid-size item of unknown purpose (1-10 MiB)",
            &[],
            &[],
            &[],
            Some(MIB),
            Some(10 * MIB),
            None,
        ),
        // ── safe ──
        Rule::new(
            "cache-directories",
            RiskTier::Safe,
            "cache or temp location; regenerated on demand",
            &["cache", "caches", "tmp", "temp"],
            &[],
            &[],
            None,
            None,
            None,
        ),
        Rule::new(
            "log-directories",
            RiskTier::Safe,
            "log output location",
            &["logs", "log"],
            &[],
            &[],
            None,
            None,
            None,
        ),
        Rule::new(
            "thumbnail-caches",
            RiskTier::Safe,
            "thumbnail or prefetch cache; regenerated on demand",
            &["thumbnails", "iconcache", "prefetch"],
            &[],
            &[],
            None,
            None,
            None,
        ),
        Rule::new(
            "log-files",
            RiskTier::Safe,
            "log file",
            &[],
            &["*.log"],
            &[],
            None,
            None,
            None,
        ),
        Rule::new(
            "temp-files",
            RiskTier::Safe,
            "temporary or leftover file",
            &[],
            &["*.tmp", "*.temp", "*.bak", "*.old", "*~"],
            &[],
            None,
            None,
            None,
        ),
        Rule::new(
            "tiny-leftovers",
            RiskTier::Safe,
            "leftover smaller than 1 KiB",
            &[],
            &[],
            &[],
            None,
            Some(1024),
            None,
        ),
        Rule::new(
            "long-untouched",
            RiskTier::Safe,
            "not modified in over 90 days",
            &[],
            &[],
            &[],
            None,
            None,
            Some(90),
        ),
    ]
}

fn lower_segments(path: &Path) -> Vec<String> {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
        .collect()
}

/// The free classification tier. Pure and infallible: no I/O beyond the
/// metadata already on the candidate, and every item gets a verdict.
pub struct RuleClassifier {
    protected_paths: Vec<PathBuf>,
}

impl RuleClassifier {
    pub fn new(protected_paths: &[String]) -> RuleClassifier {
        RuleClassifier {
            protected_paths: protected_paths.iter().map(PathBuf::from).collect(),
        }
    }

    pub fn classify(&self, item: &CandidateItem) -> ClassificationVerdict {
        if self
            .protected_paths
            .iter()
            .any(|p| item.path.starts_with(p))
        {
            return self.verdict(item, RiskTier::Dangerous, "protected path".to_string());
        }

        for tier in [RiskTier::Dangerous, RiskTier::Suspicious, RiskTier::Safe] {
            for rule in BUILT_IN_RULES.iter().filter(|r| r.tier == tier) {
                if rule.matches(item) {
                    return self.verdict(item, tier, rule.description.to_string());
                }
            }
        }

        // No rule matched: the uncertain middle tier, unless the scanner
        // supplied a hint.
        let tier = item.risk_hint.unwrap_or(RiskTier::Suspicious);
        self.verdict(item, tier, "no rule matched".to_string())
    }

    fn verdict(
        &self,
        item: &CandidateItem,
        tier: RiskTier,
        rationale: String,
    ) -> ClassificationVerdict {
        ClassificationVerdict {
            item: item.clone(),
            rule_tier: tier,
            tier,
            rationale,
            confidence: 1.0,
            source: VerdictSource::Rule,
        }
    }
}
