use repodiff::utils::hunk_parser::extract_hunks;

#[test]
fn parses_single_hunk() {
    let patch = "diff --git a/a.txt b/a.txt\n--- a/a.txt\n+++ b/a.txt\n@@ -1,1 +1,2 @@\n hello\n+world\n";
    let extracted = extract_hunks(patch);
    assert!(extracted.self_check_note.is_none());
    assert_eq!(extracted.hunks.len(), 1);
    let hunk = &extracted.hunks[0];
    assert_eq!(hunk.added, 1);
    assert_eq!(hunk.deleted, 0);
    assert_eq!(hunk.old_lines, 1);
    assert_eq!(hunk.new_lines, 2);
}

#[test]
fn defaults_missing_counts_to_one() {
    let patch = "@@ -1 +1 @@\n-a\n+b\n";
    let extracted = extract_hunks(patch);
    assert_eq!(extracted.hunks[0].old_lines, 1);
    assert_eq!(extracted.hunks[0].new_lines, 1);
}

#[test]
fn detects_crlf_only_change() {
    let patch = "@@ -1,1 +1,1 @@\n-abc\r\n+abc\n";
    let extracted = extract_hunks(patch);
    let hunk = &extracted.hunks[0];
    assert!(hunk.eol_only_change);
    assert!(hunk.whitespace_only_change);
}

#[test]
fn substantive_change_is_not_eol_only() {
    let patch = "@@ -1,1 +1,1 @@\n-abc\n+xyz\n";
    let extracted = extract_hunks(patch);
    let hunk = &extracted.hunks[0];
    assert!(!hunk.eol_only_change);
    assert!(!hunk.whitespace_only_change);
}

#[test]
fn whitespace_only_change_detected_without_eol_change() {
    let patch = "@@ -1,1 +1,1 @@\n-a b\n+a  b\n";
    let extracted = extract_hunks(patch);
    let hunk = &extracted.hunks[0];
    assert!(hunk.whitespace_only_change);
    assert!(!hunk.eol_only_change);
}

#[test]
fn mismatched_accounting_yields_note_and_no_hunks() {
    // Header claims 3 old lines but body only has 1 context line.
    let patch = "@@ -1,3 +1,1 @@\n line\n";
    let extracted = extract_hunks(patch);
    assert!(extracted.hunks.is_empty());
    assert!(extracted.self_check_note.is_some());
}

#[test]
fn no_newline_marker_does_not_count() {
    let patch = "@@ -1,1 +1,1 @@\n-a\n\\ No newline at end of file\n+b\n";
    let extracted = extract_hunks(patch);
    assert!(extracted.self_check_note.is_none());
    assert_eq!(extracted.hunks[0].deleted, 1);
    assert_eq!(extracted.hunks[0].added, 1);
}
