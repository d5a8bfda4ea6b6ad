//! Pipeline orchestration (spec.md §2, §4).
//!
//! Wires the six components together in the fixed order spec.md's
//! overview table lays out: version check, workspace, change discovery,
//! per-file hunk extraction and capping, the global cap, then canonical
//! serialization. Nothing here talks to `git` directly: that is entirely
//! `utils::git_operations`'s job.

use std::thread;

use tracing::{debug, info, info_span, warn};

use crate::config::Config;
use crate::core::caps::{apply_global_cap, apply_policy_and_file_cap, dedup_notes};
use crate::core::discovery::discover_changes;
use crate::error::{PipelineError, Result as PipelineResult};
use crate::model::{CapsInfo, EnvLocks, Envelope, FileChangeRecord, Payload, Provenance, RenameDetectionInfo};
use crate::utils::git_operations::{GitDriver, SubprocessGitDriver, Workspace};
use crate::utils::policy::PolicyTable;
use crate::utils::serializer;

/// Run the full pipeline against a validated `Config`, returning the
/// final `{ok:true,...}`/`{ok:false,...}` envelope. Never panics: every
/// fallible step is folded into the envelope's error branch.
pub fn run(config: Config) -> Envelope {
    let driver = SubprocessGitDriver::new();
    run_with_driver(&driver, config)
}

/// Same as `run`, but against an injected `GitDriver`: the seam tests
/// (and the optional HTTP surface, which reuses one driver instance
/// across requests) use this to avoid shelling out to a real `git` binary.
pub fn run_with_driver(driver: &dyn GitDriver, config: Config) -> Envelope {
    let keep_workdir = config.keep_workdir;
    let keep_on_error = config.keep_on_error;

    match run_inner(driver, &config) {
        Ok((payload, workspace)) => {
            if keep_workdir {
                let path = workspace.into_kept();
                info!(workdir = %path.display(), "kept workspace on request");
            }
            Envelope::ok(payload)
        }
        Err((err, workspace)) => {
            if let Some(ws) = workspace {
                if keep_workdir || keep_on_error {
                    let path = ws.into_kept();
                    warn!(workdir = %path.display(), "kept workspace after error");
                }
            }
            err.into_envelope()
        }
    }
}

type InnerError = (PipelineError, Option<Workspace>);

fn run_inner(driver: &dyn GitDriver, config: &Config) -> std::result::Result<(Payload, Workspace), InnerError> {
    let git_version = driver.detect_version().map_err(|e| (e, None))?;

    let commits = [config.commit_good.as_str(), config.commit_candidate.as_str()];
    let workspace = driver
        .ensure_workspace(&config.repo_url, &commits, config.branch_name.as_deref())
        .map_err(|e| (e, None))?;

    match build_payload(driver, &workspace, config, &git_version) {
        Ok(payload) => Ok((payload, workspace)),
        Err(e) => Err((e, Some(workspace))),
    }
}

fn build_payload(
    driver: &dyn GitDriver,
    workspace: &Workspace,
    config: &Config,
    git_version: &str,
) -> PipelineResult<Payload> {
    let (files, mut notes) = {
        let _span = info_span!("discovery").entered();
        let result = discover_changes(
            driver,
            workspace,
            &config.commit_good,
            &config.commit_candidate,
            config.find_renames_threshold,
        )?;
        debug!(files = result.0.len(), "change discovery complete");
        result
    };

    let patches = {
        let _span = info_span!("hunk_extraction").entered();
        extract_patches(driver, workspace, config, &files)?
    };

    let (files, omitted_files_count, notes) = {
        let _span = info_span!("cap_engine").entered();
        let policy = PolicyTable::default_table();
        let mut capped_files = Vec::with_capacity(files.len());
        for (file, patch) in files.into_iter().zip(patches.into_iter()) {
            if file.is_binary || file.is_submodule {
                capped_files.push(file);
                continue;
            }

            let (capped, file_notes) = apply_policy_and_file_cap(file, patch.as_deref(), config.cap_file, &policy);
            notes.extend(file_notes);
            capped_files.push(capped);
        }

        let (files, omitted_files_count) = apply_global_cap(capped_files, config.cap_total);
        if omitted_files_count > 0 {
            warn!(omitted_files_count, "global cap omitted files");
        }
        (files, omitted_files_count, dedup_notes(notes))
    };

    let mut payload = Payload {
        provenance: Provenance {
            repo_url: config.repo_url.clone(),
            commit_good: config.commit_good.clone(),
            commit_candidate: config.commit_candidate.clone(),
            branch_name: config.branch_name.clone(),
            caps: CapsInfo {
                cap_total: config.cap_total,
                cap_file: config.cap_file,
                context_lines: config.context_lines,
            },
            rename_detection: RenameDetectionInfo { threshold: config.find_renames_threshold },
            git_version: git_version.to_string(),
            diff_algorithm: "myers".to_string(),
            env_locks: EnvLocks::default(),
            checksum: String::new(),
        },
        files,
        omitted_files_count,
        notes,
    };

    let checksum = {
        let _span = info_span!("serialize").entered();
        serializer::compute_checksum(&payload).map_err(|e| PipelineError::Internal {
            message: format!("failed to compute checksum: {e}"),
        })?
    };
    payload.provenance.checksum = checksum;

    Ok(payload)
}

/// Fetch `unified_patch` text for every non-binary, non-submodule file,
/// fanned out across a bounded pool of scoped threads (spec.md §5:
/// "implementations may extract hunks for multiple files in parallel,
/// but must then reassemble results into the order fixed by §4.B").
/// Reassembly here is by index into a `Vec` the same length and order as
/// `files`, so no re-sorting is needed before the sequential Cap Engine
/// pass. Binary and submodule entries never reach `unified_patch` and
/// get `None`.
fn extract_patches(
    driver: &dyn GitDriver,
    workspace: &Workspace,
    config: &Config,
    files: &[FileChangeRecord],
) -> PipelineResult<Vec<Option<String>>> {
    let needs_patch: Vec<usize> = files
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.is_binary && !f.is_submodule)
        .map(|(i, _)| i)
        .collect();

    let mut patches: Vec<Option<String>> = vec![None; files.len()];
    if needs_patch.is_empty() {
        return Ok(patches);
    }

    let worker_count = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(needs_patch.len());
    let chunk_size = ((needs_patch.len() + worker_count - 1) / worker_count).max(1);

    let results: Vec<(usize, PipelineResult<String>)> = thread::scope(|scope| {
        let handles: Vec<_> = needs_patch
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|&i| {
                            let file = &files[i];
                            let patch = driver.unified_patch(
                                workspace,
                                &config.commit_good,
                                &config.commit_candidate,
                                file.path_old.as_deref(),
                                file.path_new.as_deref(),
                                config.context_lines,
                            );
                            (i, patch)
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().expect("hunk extraction worker panicked"))
            .collect()
    });

    // Apply in index order so the first real driver error encountered is
    // the one reported, regardless of which worker thread hit it first.
    let mut ordered = results;
    ordered.sort_by_key(|(i, _)| *i);
    for (i, patch) in ordered {
        patches[i] = Some(patch?);
    }
    Ok(patches)
}
