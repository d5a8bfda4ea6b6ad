//! Hunk Extractor (spec.md §4.C).
//!
//! Parses the unified-diff text of a single file into structured `Hunk`
//! candidates. Per spec.md §9's "lazy string processing" note, a parsed
//! hunk's body is kept as a borrow of the original patch text: `patch`
//! costs no allocation until the Cap Engine (`core::caps`) decides to
//! admit it.

use regex::Regex;

use crate::model::Hunk;

/// A hunk still borrowing from the file's raw patch text, before the Cap
/// Engine has decided whether to admit it.
#[derive(Debug, Clone)]
pub struct ParsedHunk<'a> {
    pub header: String,
    pub old_start: u64,
    pub old_lines: u64,
    pub new_start: u64,
    pub new_lines: u64,
    pub added: u64,
    pub deleted: u64,
    pub patch: &'a str,
    pub eol_only_change: bool,
    pub whitespace_only_change: bool,
}

impl<'a> ParsedHunk<'a> {
    /// Byte cost against the caps, computed without allocating.
    pub fn byte_cost(&self) -> u64 {
        self.patch.len() as u64
    }

    /// Materialize an owned `Hunk` for inclusion in a `FileChangeRecord`.
    pub fn to_owned_hunk(&self) -> Hunk {
        Hunk {
            header: self.header.clone(),
            old_start: self.old_start,
            old_lines: self.old_lines,
            new_start: self.new_start,
            new_lines: self.new_lines,
            added: self.added,
            deleted: self.deleted,
            patch: self.patch.to_string(),
        }
    }
}

/// Result of extracting hunks from one file's patch text.
#[derive(Debug, Clone, Default)]
pub struct ExtractedHunks<'a> {
    pub hunks: Vec<ParsedHunk<'a>>,
    /// Set when the self-check (spec.md §4.C) finds a hunk whose header
    /// numbers disagree with its body's line accounting. The file is
    /// still emitted, but with no hunks and this diagnostic attached.
    pub self_check_note: Option<String>,
}

fn header_regex() -> Regex {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("static hunk header regex")
}

fn strip_eol(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

fn strip_all_whitespace(line: &str) -> String {
    line.chars().filter(|c| !c.is_ascii_whitespace()).collect()
}

/// Classify a hunk's body as EOL-only and/or whitespace-only, per spec.md
/// §4.C and §9's Open Question 2: `eol_only_change` is `false` whenever
/// any paired change line differs after EOL-normalization, even if other
/// pairs in the same hunk are pure EOL conversions.
fn classify(deleted_lines: &[&str], added_lines: &[&str]) -> (bool, bool) {
    if deleted_lines.is_empty() && added_lines.is_empty() {
        return (false, false);
    }
    if deleted_lines.len() != added_lines.len() {
        return (false, false);
    }

    let mut eol_only = true;
    let mut whitespace_only = true;
    for (d, a) in deleted_lines.iter().zip(added_lines.iter()) {
        // `d`/`a` still carry their original trailing `\r`, if any: callers
        // must pass the raw body line here, not one already run through
        // `strip_eol`, or every pair looks EOL-identical and this always
        // returns false.
        let d_content = &d[1..]; // strip leading '-'/'+'
        let a_content = &a[1..];

        if strip_eol(d_content) != strip_eol(a_content) {
            eol_only = false;
        } else if d_content == a_content {
            // Identical content, no EOL difference either. Not an
            // EOL-only change by itself, but doesn't break whitespace.
            eol_only = false;
        }

        if strip_all_whitespace(d_content) != strip_all_whitespace(a_content) {
            whitespace_only = false;
        }
    }
    (eol_only, whitespace_only)
}

/// Parse the unified-diff body for a single file into `ParsedHunk`s.
///
/// `patch_text` is expected to be the `git diff` output restricted to one
/// file (as `GitDriver::unified_patch` returns), including its `diff
/// --git`/`---`/`+++` preamble, which this function skips over.
pub fn extract_hunks<'a>(patch_text: &'a str) -> ExtractedHunks<'a> {
    let header_re = header_regex();
    let mut hunks = Vec::new();
    let mut note = None;

    let lines: Vec<&str> = split_keep_lines(patch_text);
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if let Some(caps) = header_re.captures(line) {
            let old_start: u64 = caps[1].parse().unwrap_or(0);
            let old_lines: u64 = caps
                .get(2)
                .map(|m| m.as_str().parse().unwrap_or(1))
                .unwrap_or(1);
            let new_start: u64 = caps[3].parse().unwrap_or(0);
            let new_lines: u64 = caps
                .get(4)
                .map(|m| m.as_str().parse().unwrap_or(1))
                .unwrap_or(1);

            let body_start = i + 1;
            let mut j = body_start;
            while j < lines.len() && !header_re.is_match(lines[j]) && !lines[j].starts_with("diff --git") {
                j += 1;
            }
            let body = &lines[body_start..j];

            let mut context = 0u64;
            let mut added = 0u64;
            let mut deleted = 0u64;
            let mut deleted_lines = Vec::new();
            let mut added_lines = Vec::new();
            for raw in body {
                // Sign detection only needs the first byte, so it is safe
                // to read straight off `raw` without stripping line
                // endings first; `deleted_lines`/`added_lines` keep any
                // trailing `\r` so `classify` can still see it.
                if let Some(first) = raw.chars().next() {
                    match first {
                        ' ' => context += 1,
                        '-' => {
                            deleted += 1;
                            deleted_lines.push(*raw);
                        }
                        '+' => {
                            added += 1;
                            added_lines.push(*raw);
                        }
                        '\\' => {
                            // `\ No newline at end of file`, retained
                            // verbatim, counted toward nothing.
                        }
                        _ => {}
                    }
                }
            }

            let expected_old = context + deleted;
            let expected_new = context + added;
            if expected_old != old_lines || expected_new != new_lines {
                note = Some(format!(
                    "hunk accounting mismatch at @@ -{old_start},{old_lines} +{new_start},{new_lines} @@: \
                     computed -{expected_old} +{expected_new}"
                ));
                return ExtractedHunks { hunks: Vec::new(), self_check_note: note };
            }

            let (eol_only_change, whitespace_only_change) = classify(&deleted_lines, &added_lines);

            let patch_start_offset = offset_of(patch_text, line);
            let patch_end_offset = if j < lines.len() {
                offset_of(patch_text, lines[j])
            } else {
                patch_text.len()
            };
            let patch_slice = &patch_text[patch_start_offset..patch_end_offset];

            hunks.push(ParsedHunk {
                header: line.to_string(),
                old_start,
                old_lines,
                new_start,
                new_lines,
                added,
                deleted,
                patch: patch_slice.trim_end_matches('\n'),
                eol_only_change,
                whitespace_only_change,
            });

            i = j;
        } else {
            i += 1;
        }
    }

    ExtractedHunks { hunks, self_check_note: note }
}

/// Split `text` into `&str` lines that remain substrings of `text`,
/// splitting on `'\n'` only. Unlike `str::lines`, this keeps a trailing
/// `'\r'` attached to the line it terminates, since that `\r` is exactly
/// the signal `classify` needs to tell a CRLF line from its LF twin.
fn split_keep_lines(text: &str) -> Vec<&str> {
    text.split('\n').collect()
}

/// Byte offset of a line (known to be a substring of `text`) within
/// `text`. Safe because every `line` passed in was produced by
/// `split_keep_lines` on this exact `text`.
fn offset_of(text: &str, line: &str) -> usize {
    let base = text.as_ptr() as usize;
    let ptr = line.as_ptr() as usize;
    ptr.saturating_sub(base).min(text.len())
}
