//! Cap Engine (spec.md §4.D).
//!
//! Runs after hunk extraction, with global knowledge of every file's byte
//! cost. Two sequential passes: per-file capping with first/last-hunk
//! preservation, then a global walk in fixed output order that admits
//! whatever still fits (spec.md §4.D's "best-effort admit in order"
//! policy, which never short-circuits, so smaller files later in the
//! order can still fit after a large file is dropped).

use std::collections::HashSet;

use crate::model::FileChangeRecord;
use crate::utils::hunk_parser::{extract_hunks, ParsedHunk};
use crate::utils::policy::PolicyTable;

/// Apply lockfile/generated summarization and the per-file byte cap to
/// one file's raw patch text (spec.md §4.D). `patch_text` is `None` for
/// files the Hunk Extractor never runs on (binary, submodule, or a
/// content-identical rename/mode change with no diff body).
pub fn apply_policy_and_file_cap(
    mut record: FileChangeRecord,
    patch_text: Option<&str>,
    cap_file: u64,
    policy: &PolicyTable,
) -> (FileChangeRecord, Vec<String>) {
    let mut notes = Vec::new();

    if record.is_binary || record.is_submodule {
        return (record, notes);
    }

    let patch_text = match patch_text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return (record, notes),
    };

    let extracted = extract_hunks(patch_text);
    if let Some(note) = extracted.self_check_note {
        notes.push(format!("{}: {}", record.effective_path(), note));
        record.hunks = Vec::new();
        return (record, notes);
    }
    if extracted.hunks.is_empty() {
        return (record, notes);
    }

    let path = record.effective_path().to_string();
    let raw_total: u64 = extracted.hunks.iter().map(ParsedHunk::byte_cost).sum();

    if policy.is_lockfile_or_generated(&path) && raw_total > cap_file {
        record.summarized = true;
        record.hunks = Vec::new();
        notes.push(format!("summarized lockfile: {path}"));
        return (record, notes);
    }

    let (admitted, truncated, omitted) = per_file_admission(&extracted.hunks, cap_file);
    record.hunks = admitted.iter().map(|&i| extracted.hunks[i].to_owned_hunk()).collect();
    record.truncated = truncated;
    record.omitted_hunks_count = if truncated { Some(omitted) } else { None };
    record.eol_only_change = extracted.hunks.iter().all(|h| h.eol_only_change);
    record.whitespace_only_change = extracted.hunks.iter().all(|h| h.whitespace_only_change);

    (record, notes)
}

/// Per-file admission (spec.md §4.D steps 1-4). Returns the admitted
/// hunk indices (ascending, extraction order), whether the file was
/// truncated, and the omitted-hunk count.
fn per_file_admission(hunks: &[ParsedHunk], cap_file: u64) -> (Vec<usize>, bool, u64) {
    let total = hunks.len();
    if total == 0 {
        return (Vec::new(), false, 0);
    }

    let mut admitted = Vec::new();
    let mut running = 0u64;
    let mut overflowed = false;
    for (i, hunk) in hunks.iter().enumerate() {
        let cost = hunk.byte_cost();
        if running + cost <= cap_file {
            admitted.push(i);
            running += cost;
        } else {
            overflowed = true;
            break;
        }
    }

    if !overflowed {
        return (admitted, false, 0);
    }

    // Preservation mode: guarantee at least the first-admitted and last
    // hunks survive.
    if admitted.is_empty() {
        // The very first hunk alone exceeds the cap. It is still the
        // anchor: "single oversized hunk kept in full" (spec.md §8).
        admitted.push(0);
        running = hunks[0].byte_cost();
    }

    let last_idx = total - 1;
    let first_idx = admitted[0];
    if last_idx == first_idx {
        return (admitted, true, 0);
    }

    let last_cost = hunks[last_idx].byte_cost();
    while admitted.len() > 1 && running + last_cost > cap_file {
        let evicted = admitted.pop().expect("admitted is non-empty in this loop");
        running -= hunks[evicted].byte_cost();
    }

    if running + last_cost <= cap_file {
        admitted.push(last_idx);
        let retained = admitted.len() as u64;
        (admitted, true, total as u64 - retained)
    } else {
        admitted.truncate(1);
        (admitted, true, total as u64 - 1)
    }
}

/// Global cap (spec.md §4.D). Walks `files` in their already-fixed output
/// order and admits whichever files' (already per-file-capped) hunks
/// still fit the remaining budget, dropping the rest to metadata-only
/// records without ever stopping early.
pub fn apply_global_cap(mut files: Vec<FileChangeRecord>, cap_total: u64) -> (Vec<FileChangeRecord>, u64) {
    let mut running = 0u64;
    let mut omitted_files_count = 0u64;

    for file in files.iter_mut() {
        if file.hunks.is_empty() {
            continue;
        }
        let cost = file.diff_body_cost();
        if running + cost <= cap_total {
            running += cost;
        } else {
            file.hunks = Vec::new();
            file.truncated = false;
            file.omitted_hunks_count = None;
            omitted_files_count += 1;
        }
    }

    (files, omitted_files_count)
}

/// De-duplicate notes preserving first-seen order (spec.md §4.F.1).
pub fn dedup_notes(notes: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    notes.into_iter().filter(|n| seen.insert(n.clone())).collect()
}
