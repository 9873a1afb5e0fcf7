//! Validation engine for rank profile documents.
//!
//! The engine runs all registered [`ValidationRule`]s against a
//! [`RankProfileSpec`] and collects every diagnostic into a
//! [`ValidationReport`]. It never short-circuits on the first error, so
//! users see all problems at once.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use rapid_rankfeatures::profile::validation::ValidationEngine;
//!
//! let engine = ValidationEngine::with_defaults();
//! let report = engine.validate(&spec);
//! if report.has_errors() {
//!     for err in report.errors() {
//!         eprintln!("{err}");
//!     }
//! }
//! ```

use serde::Serialize;

use super::errors::ProfileSpecError;
use super::spec::RankProfileSpec;
use crate::blueprint::BlueprintCatalog;
use crate::error_code::ErrorCode;
use crate::feature_name::FeatureName;

// ─── Severity ───────────────────────────────────────────────────────────────

/// Whether a diagnostic is a hard error or a soft warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

// ─── Diagnostic ─────────────────────────────────────────────────────────────

/// A single validation finding.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationDiagnostic {
    pub severity: Severity,
    #[serde(flatten)]
    pub error: ProfileSpecError,
}

impl ValidationDiagnostic {
    pub fn error(err: ProfileSpecError) -> Self {
        Self {
            severity: Severity::Error,
            error: err,
        }
    }

    pub fn warning(err: ProfileSpecError) -> Self {
        Self {
            severity: Severity::Warning,
            error: err,
        }
    }
}

// ─── Report ─────────────────────────────────────────────────────────────────

/// Collected diagnostics from running all validation rules.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    /// Iterate over error-severity diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &ProfileSpecError> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| &d.error)
    }

    /// Iterate over warning-severity diagnostics.
    pub fn warnings(&self) -> impl Iterator<Item = &ProfileSpecError> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .map(|d| &d.error)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Returns `true` if there are no errors (warnings are acceptable).
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// The first error, if any.
    pub fn into_result(self) -> Result<Self, ProfileSpecError> {
        if let Some(err) = self.errors().next().cloned() {
            return Err(err);
        }
        Ok(self)
    }
}

// ─── Rule trait ─────────────────────────────────────────────────────────────

/// A single validation rule that inspects a [`RankProfileSpec`] and returns
/// zero or more diagnostics.
pub trait ValidationRule: Send + Sync {
    /// Short, stable identifier for this rule (e.g., `"feature_names"`).
    fn name(&self) -> &str;

    fn validate(&self, spec: &RankProfileSpec) -> Vec<ValidationDiagnostic>;
}

// ─── Engine ─────────────────────────────────────────────────────────────────

/// Runs a set of [`ValidationRule`]s and collects all diagnostics.
pub struct ValidationEngine {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl ValidationEngine {
    /// Create an empty engine with no rules.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Create an engine pre-loaded with the default rule set.
    pub fn with_defaults() -> Self {
        let mut engine = Self::new();
        engine.add_rule(Box::new(VersionRule));
        engine.add_rule(Box::new(FeatureListRule));
        engine.add_rule(Box::new(FeatureNamesRule));
        engine.add_rule(Box::new(DuplicateFeaturesRule));
        engine.add_rule(Box::new(RuntimeLimitsRule));
        engine.add_rule(Box::new(UnknownFieldsRule));
        engine
    }

    /// Default rules plus a check that every base name is in `catalog`.
    pub fn for_catalog(catalog: &BlueprintCatalog) -> Self {
        let mut engine = Self::with_defaults();
        engine.add_rule(Box::new(KnownFeaturesRule::from_catalog(catalog)));
        engine
    }

    /// Register an additional rule.
    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run all rules against `spec` and return the collected report.
    pub fn validate(&self, spec: &RankProfileSpec) -> ValidationReport {
        let mut report = ValidationReport::default();
        for rule in &self.rules {
            report.diagnostics.extend(rule.validate(spec));
        }
        report
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Every feature list of the profile with its JSON pointer.
fn feature_lists(spec: &RankProfileSpec) -> [(&'static str, &[String]); 3] {
    [
        ("/features", &spec.features),
        ("/summary_features", &spec.summary_features),
        ("/dump_features", &spec.dump_features),
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Concrete rules
// ═══════════════════════════════════════════════════════════════════════════

// ─── 1. Supported version ───────────────────────────────────────────────────

struct VersionRule;

impl ValidationRule for VersionRule {
    fn name(&self) -> &str {
        "version"
    }

    fn validate(&self, spec: &RankProfileSpec) -> Vec<ValidationDiagnostic> {
        if spec.v == RankProfileSpec::CURRENT_VERSION {
            return vec![];
        }
        vec![ValidationDiagnostic::error(
            ProfileSpecError::new(
                ErrorCode::UnsupportedVersion,
                "/v",
                format!("profile version {} is not supported", spec.v),
            )
            .with_hint(format!("Set \"v\" to {}", RankProfileSpec::CURRENT_VERSION)),
        )]
    }
}

// ─── 2. At least one feature ────────────────────────────────────────────────

struct FeatureListRule;

impl ValidationRule for FeatureListRule {
    fn name(&self) -> &str {
        "feature_list"
    }

    fn validate(&self, spec: &RankProfileSpec) -> Vec<ValidationDiagnostic> {
        if !spec.features.is_empty() {
            return vec![];
        }
        vec![ValidationDiagnostic::error(
            ProfileSpecError::new(
                ErrorCode::MissingFeatures,
                "/features",
                "the profile lists no features",
            )
            .with_hint("Add at least one feature name to 'features'"),
        )]
    }
}

// ─── 3. Feature names must parse ────────────────────────────────────────────

struct FeatureNamesRule;

impl ValidationRule for FeatureNamesRule {
    fn name(&self) -> &str {
        "feature_names"
    }

    fn validate(&self, spec: &RankProfileSpec) -> Vec<ValidationDiagnostic> {
        let mut out = Vec::new();
        for (path, names) in feature_lists(spec) {
            for (i, name) in names.iter().enumerate() {
                if let Err(err) = FeatureName::parse(name) {
                    out.push(ValidationDiagnostic::error(
                        ProfileSpecError::new(
                            ErrorCode::InvalidConfiguration,
                            format!("{path}/{i}"),
                            err.to_string(),
                        )
                        .with_hint("Use the form name(param,...) with an optional .output"),
                    ));
                }
            }
        }
        out
    }
}

// ─── 4. Duplicates (warning) ────────────────────────────────────────────────

struct DuplicateFeaturesRule;

impl ValidationRule for DuplicateFeaturesRule {
    fn name(&self) -> &str {
        "duplicate_features"
    }

    fn validate(&self, spec: &RankProfileSpec) -> Vec<ValidationDiagnostic> {
        let mut out = Vec::new();
        for (path, names) in feature_lists(spec) {
            let mut seen: Vec<String> = Vec::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                let Ok(parsed) = FeatureName::parse(name) else {
                    continue;
                };
                let canonical = parsed.full_name();
                if seen.contains(&canonical) {
                    out.push(ValidationDiagnostic::warning(
                        ProfileSpecError::new(
                            ErrorCode::DuplicateFeature,
                            format!("{path}/{i}"),
                            format!("'{}' is listed more than once", canonical),
                        )
                        .with_hint("Duplicates resolve to the same feature; remove the extra entry"),
                    ));
                } else {
                    seen.push(canonical);
                }
            }
        }
        out
    }
}

// ─── 5. Runtime limits must be positive when set ────────────────────────────

struct RuntimeLimitsRule;

impl ValidationRule for RuntimeLimitsRule {
    fn name(&self) -> &str {
        "runtime_limits"
    }

    fn validate(&self, spec: &RankProfileSpec) -> Vec<ValidationDiagnostic> {
        let checks: [(&str, Option<u64>); 3] = [
            ("/runtime/max_threads", spec.runtime.max_threads.map(|n| n as u64)),
            ("/runtime/query_timeout_ms", spec.runtime.query_timeout_ms),
            ("/max_dependency_depth", spec.max_dependency_depth.map(|n| n as u64)),
        ];

        checks
            .iter()
            .filter(|(_, value)| *value == Some(0))
            .map(|(path, _)| {
                let field = path.rsplit('/').next().unwrap_or(*path);
                ValidationDiagnostic::error(
                    ProfileSpecError::new(
                        ErrorCode::InvalidValue,
                        *path,
                        format!("{field} must be greater than 0"),
                    )
                    .with_hint(format!("Remove {field} to use the default, or set it to a positive value")),
                )
            })
            .collect()
    }
}

// ─── 6. Unknown fields (strict → error, non-strict → warning) ──────────────

struct UnknownFieldsRule;

impl UnknownFieldsRule {
    /// Collect unknown-field diagnostics at the given JSON pointer `path`
    /// from a `HashMap` of extra fields captured by `#[serde(flatten)]`.
    fn check_unknowns(
        path: &str,
        unknowns: &std::collections::HashMap<String, serde_json::Value>,
        strict: bool,
    ) -> Vec<ValidationDiagnostic> {
        let mut keys: Vec<_> = unknowns.keys().collect();
        keys.sort();
        keys.into_iter()
            .map(|key| {
                let diag_fn = if strict {
                    ValidationDiagnostic::error
                } else {
                    ValidationDiagnostic::warning
                };
                diag_fn(
                    ProfileSpecError::new(
                        ErrorCode::UnknownField,
                        format!("{path}/{key}"),
                        format!("unrecognized field \"{key}\""),
                    )
                    .with_hint("Check spelling or remove this field"),
                )
            })
            .collect()
    }
}

impl ValidationRule for UnknownFieldsRule {
    fn name(&self) -> &str {
        "unknown_fields"
    }

    fn validate(&self, spec: &RankProfileSpec) -> Vec<ValidationDiagnostic> {
        let mut out = Vec::new();
        out.extend(Self::check_unknowns("", &spec.unknown_fields, spec.strict));
        out.extend(Self::check_unknowns(
            "/runtime",
            &spec.runtime.unknown_fields,
            spec.strict,
        ));
        out
    }
}

// ─── 7. Base names must be registered ───────────────────────────────────────

/// Flags features whose base name the catalog does not know.
pub struct KnownFeaturesRule {
    names: Vec<String>,
}

impl KnownFeaturesRule {
    pub fn from_catalog(catalog: &BlueprintCatalog) -> Self {
        Self {
            names: catalog.names().map(str::to_string).collect(),
        }
    }
}

impl ValidationRule for KnownFeaturesRule {
    fn name(&self) -> &str {
        "known_features"
    }

    fn validate(&self, spec: &RankProfileSpec) -> Vec<ValidationDiagnostic> {
        let mut out = Vec::new();
        for (path, names) in feature_lists(spec) {
            for (i, name) in names.iter().enumerate() {
                let Ok(parsed) = FeatureName::parse(name) else {
                    continue;
                };
                if !self.names.iter().any(|n| n == parsed.base()) {
                    out.push(ValidationDiagnostic::error(
                        ProfileSpecError::new(
                            ErrorCode::UnknownFeature,
                            format!("{path}/{i}"),
                            format!("unknown feature '{}'", parsed.base()),
                        )
                        .with_hint(format!("Known features: {}", self.names.join(", "))),
                    ));
                }
            }
        }
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════
