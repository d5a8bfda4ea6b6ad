use repodiff::model::{CapsInfo, EnvLocks, Payload, Provenance, RenameDetectionInfo};
use repodiff::utils::serializer::serialize_payload;

fn sample_payload() -> Payload {
    Payload {
        provenance: Provenance {
            repo_url: "https://example.test/repo.git".to_string(),
            commit_good: "a".repeat(40),
            commit_candidate: "b".repeat(40),
            branch_name: None,
            caps: CapsInfo { cap_total: 800_000, cap_file: 64_000, context_lines: 3 },
            rename_detection: RenameDetectionInfo { threshold: 90 },
            git_version: "2.43.0".to_string(),
            diff_algorithm: "myers".to_string(),
            env_locks: EnvLocks::default(),
            checksum: String::new(),
        },
        files: Vec::new(),
        omitted_files_count: 0,
        notes: Vec::new(),
    }
}

/// Walks raw JSON text tracking object/array nesting by hand (rather than
/// parsing into a `Value`, which would re-sort keys regardless of what the
/// serializer actually emitted) and asserts every object's keys appear in
/// ascending order as written.
fn assert_all_object_keys_sorted(json: &str) {
    let bytes = json.as_bytes();
    let mut stack: Vec<Option<Vec<String>>> = Vec::new(); // Some(keys) for objects, None for arrays
    let mut expect_key: Vec<bool> = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] as char {
            '"' => {
                let start = i + 1;
                let mut k = start;
                while bytes[k] != b'"' {
                    if bytes[k] == b'\\' {
                        k += 1;
                    }
                    k += 1;
                }
                let s = std::str::from_utf8(&bytes[start..k]).unwrap();
                if expect_key.last() == Some(&true) {
                    if let Some(Some(keys)) = stack.last_mut() {
                        keys.push(s.to_string());
                    }
                    *expect_key.last_mut().unwrap() = false;
                }
                i = k + 1;
            }
            '{' => {
                stack.push(Some(Vec::new()));
                expect_key.push(true);
                i += 1;
            }
            '[' => {
                stack.push(None);
                expect_key.push(false);
                i += 1;
            }
            '}' => {
                if let Some(Some(keys)) = stack.pop() {
                    let mut sorted = keys.clone();
                    sorted.sort();
                    assert_eq!(keys, sorted, "object keys not in ascending codepoint order: {keys:?}");
                }
                expect_key.pop();
                i += 1;
            }
            ']' => {
                stack.pop();
                expect_key.pop();
                i += 1;
            }
            ',' => {
                if let Some(Some(_)) = stack.last() {
                    *expect_key.last_mut().unwrap() = true;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
}

#[test]
fn keys_are_in_ascending_order_at_every_level() {
    let json = serialize_payload(sample_payload()).unwrap();
    assert_all_object_keys_sorted(&json);
    // Top-level keys sort ahead of "provenance" alphabetically.
    assert!(json.starts_with("{\"files\""));
}

#[test]
fn checksum_is_present_and_stable_across_reserialization() {
    let json1 = serialize_payload(sample_payload()).unwrap();
    let json2 = serialize_payload(sample_payload()).unwrap();
    assert_eq!(json1, json2);
    assert!(json1.contains("\"checksum\":\""));
    assert!(!json1.contains("\"checksum\":\"\""));
}

#[test]
fn checksum_changes_when_payload_changes() {
    let json1 = serialize_payload(sample_payload()).unwrap();
    let mut other = sample_payload();
    other.provenance.branch_name = Some("main".to_string());
    let json2 = serialize_payload(other).unwrap();
    assert_ne!(json1, json2);
}

#[test]
fn output_has_no_incidental_whitespace() {
    let json = serialize_payload(sample_payload()).unwrap();
    assert!(!json.contains(", "));
    assert!(!json.contains(": "));
    assert!(!json.contains('\n'));
}
