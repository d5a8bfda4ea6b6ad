//! Policy Table (spec.md §4.E).
//!
//! A static mapping from path patterns to a policy tag, consulted by the
//! Cap Engine before per-file capping to decide whether an oversized
//! lockfile/generated diff should be summarized instead of truncated.
//! Matching reuses `fnmatch-regex`, the glob-to-regex crate the teacher
//! already depends on for its own file-pattern filters.

/// One entry in the Policy Table.
#[derive(Debug, Clone)]
pub enum PolicyRule {
    /// Case-sensitive basename equality.
    ExactName(&'static str),
    /// Shell-style glob, matched against the basename.
    Glob(&'static str),
}

/// The default lockfile/generated policy set (spec.md §4.E).
pub fn default_policy() -> Vec<PolicyRule> {
    vec![
        PolicyRule::ExactName("package-lock.json"),
        PolicyRule::ExactName("yarn.lock"),
        PolicyRule::ExactName("pnpm-lock.yaml"),
        PolicyRule::ExactName("npm-shrinkwrap.json"),
        PolicyRule::ExactName("poetry.lock"),
        PolicyRule::ExactName("Pipfile.lock"),
        PolicyRule::ExactName("gradle.lockfile"),
        PolicyRule::ExactName("Gemfile.lock"),
        PolicyRule::ExactName("composer.lock"),
        PolicyRule::ExactName("Cargo.lock"),
        PolicyRule::ExactName("go.sum"),
        PolicyRule::ExactName("Package.resolved"),
        PolicyRule::ExactName("mix.lock"),
        PolicyRule::ExactName("packages.lock.json"),
        PolicyRule::Glob("*.min.js"),
        PolicyRule::Glob("*.map"),
    ]
}

/// Policy Table: a configurable list of rules classifying paths as
/// lockfile/generated (spec.md §4.E: "the table is data, not code").
pub struct PolicyTable {
    rules: Vec<PolicyRule>,
}

impl PolicyTable {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        PolicyTable { rules }
    }

    pub fn default_table() -> Self {
        PolicyTable::new(default_policy())
    }

    /// Whether `path` matches the lockfile/generated policy.
    pub fn is_lockfile_or_generated(&self, path: &str) -> bool {
        let basename = path.rsplit('/').next().unwrap_or(path);
        self.rules.iter().any(|rule| match rule {
            PolicyRule::ExactName(name) => *name == basename,
            PolicyRule::Glob(pattern) => fnmatch_regex::glob_to_regex(pattern)
                .map(|re| re.is_match(basename))
                .unwrap_or(false),
        })
    }
}
