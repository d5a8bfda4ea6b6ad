//! Change Discovery (spec.md §4.B).
//!
//! Normalizes the Git Driver's raw name-status records into the ordered
//! `FileChangeRecord` set the rest of the pipeline consumes: status
//! normalization, path assignment, metadata enrichment, binary/submodule
//! flagging, rename tie-breaking, and the fixed primary ordering.

use std::cmp::Ordering;

use crate::model::{FileChangeRecord, RenameTiebreaker, Status, SubmoduleShas};
use crate::utils::git_operations::{FileMetadata, GitDriver, RawNameStatusRecord, Workspace};

/// A rename/copy candidate prior to tie-break resolution.
struct RenameCandidate {
    record: RawNameStatusRecord,
}

/// Run Change Discovery against a workspace (spec.md §4.B).
pub fn discover_changes(
    driver: &dyn GitDriver,
    workspace: &Workspace,
    good: &str,
    cand: &str,
    find_renames_threshold: u8,
) -> crate::error::Result<(Vec<FileChangeRecord>, Vec<String>)> {
    let raw = driver.name_status(workspace, good, cand, find_renames_threshold)?;
    let mut notes = Vec::new();

    // Split into rename/copy candidates (grouped by target path below) and
    // everything else, which maps straight through.
    let mut plain = Vec::new();
    let mut rename_groups: std::collections::BTreeMap<String, Vec<RenameCandidate>> = std::collections::BTreeMap::new();

    for record in raw {
        match record.status_letter {
            'R' | 'C' => {
                let target = record.path_b.clone().unwrap_or_else(|| record.path_a.clone());
                rename_groups.entry(target).or_default().push(RenameCandidate { record });
            }
            _ => plain.push(record),
        }
    }

    let mut out = Vec::new();

    for record in plain {
        out.push(plain_record(driver, workspace, good, cand, record)?);
    }

    for (_target, mut candidates) in rename_groups {
        let (winner_idx, tiebreaker) = resolve_rename_tie(driver, workspace, good, cand, &candidates);
        let winner = candidates.remove(winner_idx);
        let winner_is_rename = winner.record.status_letter == 'R';
        let winner_path_old = winner.record.path_a.clone();
        let below_threshold = winner.record.score.map(|s| s < find_renames_threshold).unwrap_or(false);

        out.push(rename_record(
            driver,
            workspace,
            good,
            cand,
            winner.record,
            tiebreaker,
            find_renames_threshold,
        )?);

        // spec.md §9 Open Question 1: a rename downgraded below threshold
        // is emitted as A+D, not a bare A. The source path's removal must
        // still be reported. A copy has no source removal to report: the
        // original file is untouched, so only the add half applies.
        if below_threshold && winner_is_rename {
            notes.push(format!("rename below threshold: {winner_path_old} downgraded to add+delete"));
            out.push(deleted_record(driver, workspace, good, winner_path_old)?);
        }

        // Losing candidates are not renames at all: their source content
        // is simply gone (spec.md §9 Open Question 1's downgrade policy
        // generalizes to "loses the tie" as well as "below threshold").
        for loser in candidates {
            let path = loser.record.path_a.clone();
            notes.push(format!("rename tie-break: {path} downgraded to delete"));
            out.push(deleted_record(driver, workspace, good, path)?);
        }
    }

    out.sort_by(|a, b| primary_order(a, b));

    Ok((out, notes))
}

/// spec.md §4.B.6: stable sort by effective path, then status letter in
/// the fixed order `A < C < D < M < R < T`.
fn primary_order(a: &FileChangeRecord, b: &FileChangeRecord) -> Ordering {
    a.effective_path()
        .cmp(b.effective_path())
        .then_with(|| a.status.cmp(&b.status))
}

fn plain_record(
    driver: &dyn GitDriver,
    workspace: &Workspace,
    good: &str,
    cand: &str,
    record: RawNameStatusRecord,
) -> crate::error::Result<FileChangeRecord> {
    let status = Status::from_letter(record.status_letter).ok_or_else(|| crate::error::PipelineError::Internal {
        message: format!("unrecognized git status letter: {}", record.status_letter),
    })?;

    let (path_old, path_new) = match status {
        Status::Added => (None, Some(record.path_a.clone())),
        Status::Deleted => (Some(record.path_a.clone()), None),
        Status::Modified | Status::TypeChanged => (Some(record.path_a.clone()), Some(record.path_a.clone())),
        Status::Renamed | Status::Copied => unreachable!("handled by rename_record"),
    };

    build_record(driver, workspace, good, cand, status, path_old, path_new, None, None)
}

fn deleted_record(
    driver: &dyn GitDriver,
    workspace: &Workspace,
    good: &str,
    path: String,
) -> crate::error::Result<FileChangeRecord> {
    let meta = driver.file_metadata(workspace, good, &path).unwrap_or_default();
    Ok(FileChangeRecord {
        status: Status::Deleted,
        path_old: Some(path),
        path_new: None,
        rename_score: None,
        rename_tiebreaker: None,
        mode_old: meta.mode,
        mode_new: None,
        size_old: meta.size,
        size_new: None,
        is_binary: meta.is_binary,
        is_submodule: meta.is_submodule,
        eol_only_change: false,
        whitespace_only_change: false,
        summarized: false,
        truncated: false,
        omitted_hunks_count: None,
        submodule: None,
        hunks: Vec::new(),
    })
}

#[allow(clippy::too_many_arguments)]
fn rename_record(
    driver: &dyn GitDriver,
    workspace: &Workspace,
    good: &str,
    cand: &str,
    record: RawNameStatusRecord,
    tiebreaker: Option<RenameTiebreaker>,
    threshold: u8,
) -> crate::error::Result<FileChangeRecord> {
    let status = if record.status_letter == 'R' {
        Status::Renamed
    } else {
        Status::Copied
    };
    let path_old = Some(record.path_a.clone());
    let path_new = record.path_b.clone().or(Some(record.path_a.clone()));
    let score = record.score;

    // spec.md §9 Open Question 1: downgrade below-threshold renames to A+D
    // rather than emitting R/C.
    if let Some(s) = score {
        if s < threshold {
            return build_record(driver, workspace, good, cand, Status::Added, None, path_new, None, None);
        }
    }

    build_record(
        driver,
        workspace,
        good,
        cand,
        status,
        path_old,
        path_new,
        score,
        tiebreaker,
    )
}

#[allow(clippy::too_many_arguments)]
fn build_record(
    driver: &dyn GitDriver,
    workspace: &Workspace,
    good: &str,
    cand: &str,
    status: Status,
    path_old: Option<String>,
    path_new: Option<String>,
    rename_score: Option<u8>,
    rename_tiebreaker: Option<RenameTiebreaker>,
) -> crate::error::Result<FileChangeRecord> {
    let meta_old = match &path_old {
        Some(p) => driver.file_metadata(workspace, good, p).unwrap_or_default(),
        None => FileMetadata::default(),
    };
    let meta_new = match &path_new {
        Some(p) => driver.file_metadata(workspace, cand, p).unwrap_or_default(),
        None => FileMetadata::default(),
    };

    let is_submodule = meta_old.is_submodule || meta_new.is_submodule;
    let is_binary = meta_old.is_binary || meta_new.is_binary;

    let submodule = if is_submodule {
        if let (Some(old_p), Some(new_p)) = (&path_old, &path_new) {
            let (o, n) = driver.submodule_shas(workspace, good, cand, new_p.as_str()).unwrap_or_default();
            let _ = old_p;
            Some(SubmoduleShas { old_sha: o, new_sha: n })
        } else {
            None
        }
    } else {
        None
    };

    Ok(FileChangeRecord {
        status,
        path_old,
        path_new,
        rename_score,
        rename_tiebreaker,
        mode_old: meta_old.mode,
        mode_new: meta_new.mode,
        size_old: meta_old.size,
        size_new: meta_new.size,
        is_binary,
        is_submodule,
        eol_only_change: false,
        whitespace_only_change: false,
        summarized: false,
        truncated: false,
        omitted_hunks_count: None,
        submodule,
        hunks: Vec::new(),
    })
}

/// Resolve a near-tie among rename/copy candidates sharing one target
/// path (spec.md §4.B.5). Returns the winning candidate's index and,
/// when a near-tie actually existed, which rule fired.
fn resolve_rename_tie(
    driver: &dyn GitDriver,
    workspace: &Workspace,
    good: &str,
    cand: &str,
    candidates: &[RenameCandidate],
) -> (usize, Option<RenameTiebreaker>) {
    if candidates.len() == 1 {
        return (0, None);
    }

    let max_score = candidates.iter().filter_map(|c| c.record.score).max().unwrap_or(0);
    let near_tie_indices: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| max_score.saturating_sub(c.record.score.unwrap_or(0)) <= 1)
        .map(|(i, _)| i)
        .collect();

    if near_tie_indices.len() <= 1 {
        // No genuine tie: pick the single highest-scoring candidate.
        let best = candidates
            .iter()
            .enumerate()
            .max_by_key(|(_, c)| c.record.score.unwrap_or(0))
            .map(|(i, _)| i)
            .unwrap_or(0);
        return (best, None);
    }

    let target = candidates[near_tie_indices[0]]
        .record
        .path_b
        .clone()
        .unwrap_or_else(|| candidates[near_tie_indices[0]].record.path_a.clone());

    // Rule (i): smallest path-component edit distance to the target.
    if let Some(&winner) = near_tie_indices
        .iter()
        .min_by_key(|&&i| path_component_distance(&candidates[i].record.path_a, &target))
    {
        let min_distance = path_component_distance(&candidates[winner].record.path_a, &target);
        let tied_on_distance: Vec<usize> = near_tie_indices
            .iter()
            .copied()
            .filter(|&i| path_component_distance(&candidates[i].record.path_a, &target) == min_distance)
            .collect();
        if tied_on_distance.len() == 1 {
            return (winner, Some(RenameTiebreaker::Path));
        }

        // Rule (ii): smallest |size_old - size_new|.
        let sized: Vec<(usize, u64)> = tied_on_distance
            .iter()
            .map(|&i| {
                let old_size = driver
                    .file_metadata(workspace, good, &candidates[i].record.path_a)
                    .ok()
                    .and_then(|m| m.size)
                    .unwrap_or(0);
                let new_size = driver
                    .file_metadata(workspace, cand, &target)
                    .ok()
                    .and_then(|m| m.size)
                    .unwrap_or(0);
                (i, old_size.abs_diff(new_size))
            })
            .collect();
        if let Some(&(winner, min_diff)) = sized.iter().min_by_key(|&&(_, d)| d) {
            let tied_on_size: Vec<usize> = sized.iter().filter(|&&(_, d)| d == min_diff).map(|&(i, _)| i).collect();
            if tied_on_size.len() == 1 {
                return (winner, Some(RenameTiebreaker::Size));
            }

            // Rule (iii): lexicographically smallest path_old.
            let winner = tied_on_size
                .iter()
                .min_by(|&&a, &&b| candidates[a].record.path_a.cmp(&candidates[b].record.path_a))
                .copied()
                .unwrap_or(winner);
            return (winner, Some(RenameTiebreaker::Lex));
        }
    }

    (near_tie_indices[0], None)
}

/// Sequence edit distance (Levenshtein) over `/`-separated path
/// components, used as the "path similarity" rename tie-break rule.
fn path_component_distance(path_a: &str, path_b: &str) -> usize {
    let a: Vec<&str> = path_a.split('/').collect();
    let b: Vec<&str> = path_b.split('/').collect();
    let (n, m) = (a.len(), b.len());
    let mut dp = vec![vec![0usize; m + 1]; n + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=m {
        dp[0][j] = j;
    }
    for i in 1..=n {
        for j in 1..=m {
            if a[i - 1] == b[j - 1] {
                dp[i][j] = dp[i - 1][j - 1];
            } else {
                dp[i][j] = 1 + dp[i - 1][j].min(dp[i][j - 1]).min(dp[i - 1][j - 1]);
            }
        }
    }
    dp[n][m]
}
