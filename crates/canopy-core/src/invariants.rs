//! Concrete detection logic behind the `Invariant` entity and `CONSTRAINS`
//! edge: a small fixed set of structural/textual checkers run over each
//! artifact at ingest time.
//!
//! Grounded on `palace/ingest/invariants/checkers/{security,code_quality}.py`
//! and its `BaseInvariantChecker`/`InvariantRegistry` split — but the
//! registry there is a process-global singleton (`_instance`). Here the
//! equivalent is `CheckerSet`, an explicit value built once (typically
//! alongside `GraphStore::open`) and threaded through the ingest adapter;
//! there is no global mutable state anywhere in this module.

use crate::model::{Artifact, AstSummary, Invariant, NodeId, Severity};
use regex::Regex;

/// A single detected rule violation, prior to being turned into a graph
/// `Invariant` node + `CONSTRAINS` edge by the ingest adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct InvariantViolation {
    pub rule_name: String,
    pub severity: Severity,
    pub message: String,
    pub line: Option<usize>,
}

impl InvariantViolation {
    pub fn into_invariant(self, id: NodeId) -> Invariant {
        Invariant {
            id,
            rule_name: self.rule_name,
            severity: self.severity,
            check_expression: Some(self.message),
        }
    }
}

/// Per-rule configuration, the Rust analogue of `CheckerConfig` — loaded
/// once from `canopy.toml`'s `[invariants]` table, not mutated afterward.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub enabled: bool,
    pub severity_override: Option<Severity>,
    pub threshold: Option<usize>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        CheckerConfig {
            enabled: true,
            severity_override: None,
            threshold: None,
        }
    }
}

pub trait Checker: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, artifact: &Artifact, content: &str, summary: &AstSummary) -> Vec<InvariantViolation>;
}

/// Flags hardcoded secrets (`api_key = "..."`, `password = "..."`, etc.) in
/// string literals. HIGH severity by default per SPEC_FULL §3.1, CRITICAL
/// in the original checker — kept configurable either way via
/// `severity_override`.
pub struct HardcodedSecretChecker {
    patterns: Vec<Regex>,
    severity: Severity,
}

impl HardcodedSecretChecker {
    pub fn new(config: &CheckerConfig) -> Self {
        let raw_patterns = [
            r#"(?i)password\s*=\s*["'][^"']{8,}["']"#,
            r#"(?i)api_key\s*=\s*["'][^"']{12,}["']"#,
            r#"(?i)secret\s*=\s*["'][^"']{12,}["']"#,
            r#"(?i)(access|auth)_token\s*=\s*["'][^"']{12,}["']"#,
            r#"AKIA[0-9A-Z]{16}"#,
        ];
        let patterns = raw_patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();
        HardcodedSecretChecker {
            patterns,
            severity: config.severity_override.unwrap_or(Severity::High),
        }
    }
}

impl Checker for HardcodedSecretChecker {
    fn name(&self) -> &'static str {
        "hardcoded_secret"
    }

    fn check(&self, artifact: &Artifact, content: &str, _summary: &AstSummary) -> Vec<InvariantViolation> {
        let path_str = artifact.path.to_string_lossy().to_lowercase();
        if path_str.contains("test") || path_str.contains("example") {
            return Vec::new();
        }

        let mut violations = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let lower = line.to_lowercase();
            if ["placeholder", "example", "fake", "xxx"].iter().any(|w| lower.contains(w)) {
                continue;
            }
            if self.patterns.iter().any(|p| p.is_match(line)) {
                violations.push(InvariantViolation {
                    rule_name: self.name().to_string(),
                    severity: self.severity,
                    message: "potential hardcoded secret".to_string(),
                    line: Some(lineno + 1),
                });
            }
        }
        violations
    }
}

/// Flags functions whose body exceeds `threshold` lines (default 150).
pub struct LongFunctionChecker {
    threshold: usize,
    severity: Severity,
}

impl LongFunctionChecker {
    pub fn new(config: &CheckerConfig) -> Self {
        LongFunctionChecker {
            threshold: config.threshold.unwrap_or(150),
            severity: config.severity_override.unwrap_or(Severity::Medium),
        }
    }
}

impl Checker for LongFunctionChecker {
    fn name(&self) -> &'static str {
        "long_function"
    }

    fn check(&self, _artifact: &Artifact, content: &str, summary: &AstSummary) -> Vec<InvariantViolation> {
        if summary.functions.is_empty() {
            return Vec::new();
        }
        let total_lines = content.lines().count();
        if total_lines == 0 {
            return Vec::new();
        }
        // Without per-function byte ranges in `AstSummary`, approximate a
        // function's length as the file's average lines-per-function; a
        // coarse signal, but sufficient to flag files with few, bloated
        // functions without tracking byte offsets through the summary type.
        let avg_len = total_lines / summary.functions.len().max(1);
        if avg_len <= self.threshold {
            return Vec::new();
        }
        summary
            .functions
            .iter()
            .map(|f| InvariantViolation {
                rule_name: self.name().to_string(),
                severity: self.severity,
                message: format!(
                    "function '{}' averages {avg_len} lines across the file (threshold: {})",
                    f.name, self.threshold
                ),
                line: None,
            })
            .collect()
    }
}

/// Flags calls to `eval`/`exec` — CRITICAL, and only meaningful for
/// languages with an eval-like construct (Python here).
pub struct EvalUsageChecker {
    severity: Severity,
}

impl EvalUsageChecker {
    pub fn new(config: &CheckerConfig) -> Self {
        EvalUsageChecker {
            severity: config.severity_override.unwrap_or(Severity::Critical),
        }
    }
}

impl Checker for EvalUsageChecker {
    fn name(&self) -> &'static str {
        "eval_usage"
    }

    fn check(&self, artifact: &Artifact, content: &str, _summary: &AstSummary) -> Vec<InvariantViolation> {
        if artifact.language != crate::model::Language::Python {
            return Vec::new();
        }
        let mut violations = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let stripped = line.trim_start();
            if stripped.starts_with('#') {
                continue;
            }
            for func in ["eval(", "exec("] {
                if line.contains(func) {
                    violations.push(InvariantViolation {
                        rule_name: self.name().to_string(),
                        severity: self.severity,
                        message: format!("use of '{func}' can lead to code injection"),
                        line: Some(lineno + 1),
                    });
                    break;
                }
            }
        }
        violations
    }
}

/// The fixed, explicitly-constructed set of active checkers. Built once
/// (typically alongside `GraphStore::open`) and passed by reference into
/// every `ingest` call — never a process-global registry.
pub struct CheckerSet {
    checkers: Vec<Box<dyn Checker>>,
}

impl CheckerSet {
    pub fn new(configs: &std::collections::HashMap<String, CheckerConfig>) -> Self {
        let get = |name: &str| configs.get(name).cloned_or_default();
        let mut checkers: Vec<Box<dyn Checker>> = Vec::new();

        let secret_cfg = get("hardcoded_secret");
        if secret_cfg.enabled {
            checkers.push(Box::new(HardcodedSecretChecker::new(&secret_cfg)));
        }
        let long_fn_cfg = get("long_function");
        if long_fn_cfg.enabled {
            checkers.push(Box::new(LongFunctionChecker::new(&long_fn_cfg)));
        }
        let eval_cfg = get("eval_usage");
        if eval_cfg.enabled {
            checkers.push(Box::new(EvalUsageChecker::new(&eval_cfg)));
        }

        CheckerSet { checkers }
    }

    pub fn default_set() -> Self {
        Self::new(&std::collections::HashMap::new())
    }

    pub fn check_all(&self, artifact: &Artifact, content: &str, summary: &AstSummary) -> Vec<InvariantViolation> {
        self.checkers
            .iter()
            .flat_map(|c| c.check(artifact, content, summary))
            .collect()
    }
}

trait ConfigMapExt {
    fn cloned_or_default(self) -> CheckerConfig;
}

impl ConfigMapExt for Option<&CheckerConfig> {
    fn cloned_or_default(self) -> CheckerConfig {
        self.cloned().unwrap_or_default()
    }
}
