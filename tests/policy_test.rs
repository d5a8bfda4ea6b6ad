use repodiff::utils::policy::PolicyTable;

#[test]
fn matches_fixed_lockfile_names() {
    let table = PolicyTable::default_table();
    assert!(table.is_lockfile_or_generated("Cargo.lock"));
    assert!(table.is_lockfile_or_generated("nested/dir/package-lock.json"));
    assert!(!table.is_lockfile_or_generated("Cargo.toml"));
}

#[test]
fn matches_glob_patterns() {
    let table = PolicyTable::default_table();
    assert!(table.is_lockfile_or_generated("dist/bundle.min.js"));
    assert!(table.is_lockfile_or_generated("app.js.map"));
    assert!(!table.is_lockfile_or_generated("app.js"));
}

#[test]
fn basename_match_is_case_sensitive() {
    let table = PolicyTable::default_table();
    assert!(!table.is_lockfile_or_generated("cargo.lock"));
}
