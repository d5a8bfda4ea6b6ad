use repodiff::core::discovery::discover_changes;
use repodiff::model::{RenameTiebreaker, Status};
use repodiff::utils::git_operations::{FileMetadata, GitDriver, RawNameStatusRecord, Workspace};

struct StubDriver {
    records: Vec<RawNameStatusRecord>,
}

impl GitDriver for StubDriver {
    fn detect_version(&self) -> repodiff::error::Result<String> {
        Ok("2.40.0".to_string())
    }
    fn ensure_workspace(&self, _: &str, _: &[&str], _: Option<&str>) -> repodiff::error::Result<Workspace> {
        unimplemented!()
    }
    fn name_status(&self, _: &Workspace, _: &str, _: &str, _: u8) -> repodiff::error::Result<Vec<RawNameStatusRecord>> {
        Ok(self.records.clone())
    }
    fn file_metadata(&self, _: &Workspace, _: &str, _: &str) -> repodiff::error::Result<FileMetadata> {
        Ok(FileMetadata::default())
    }
    fn unified_patch(
        &self,
        _: &Workspace,
        _: &str,
        _: &str,
        _: Option<&str>,
        _: Option<&str>,
        _: u32,
    ) -> repodiff::error::Result<String> {
        Ok(String::new())
    }
    fn submodule_shas(&self, _: &Workspace, _: &str, _: &str, _: &str) -> repodiff::error::Result<(String, String)> {
        Ok((String::new(), String::new()))
    }
}

#[test]
fn rename_tie_break_favors_path_similarity() {
    let driver = StubDriver {
        records: vec![
            RawNameStatusRecord {
                status_letter: 'R',
                score: Some(90),
                path_a: "foo_baz.py".to_string(),
                path_b: Some("baz.py".to_string()),
            },
            RawNameStatusRecord {
                status_letter: 'R',
                score: Some(90),
                path_a: "totally_unrelated_name.py".to_string(),
                path_b: Some("baz.py".to_string()),
            },
        ],
    };
    let workspace = Workspace::for_test(std::path::PathBuf::from("/nonexistent"));
    let (files, notes) = discover_changes(&driver, &workspace, "good", "cand", 90).unwrap();

    let winner = files
        .iter()
        .find(|f| f.status == Status::Renamed)
        .expect("a Renamed record");
    assert_eq!(winner.path_old.as_deref(), Some("foo_baz.py"));
    assert_eq!(winner.rename_tiebreaker, Some(RenameTiebreaker::Path));

    let loser = files
        .iter()
        .find(|f| f.status == Status::Deleted)
        .expect("the losing candidate downgraded to a Deleted record");
    assert_eq!(loser.path_old.as_deref(), Some("totally_unrelated_name.py"));
    assert!(notes.iter().any(|n| n.contains("rename tie-break")));
}

#[test]
fn rename_below_threshold_downgrades_to_add_and_delete() {
    let driver = StubDriver {
        records: vec![RawNameStatusRecord {
            status_letter: 'R',
            score: Some(40),
            path_a: "old_name.py".to_string(),
            path_b: Some("new_name.py".to_string()),
        }],
    };
    let workspace = Workspace::for_test(std::path::PathBuf::from("/nonexistent"));
    let (files, notes) = discover_changes(&driver, &workspace, "good", "cand", 90).unwrap();

    assert_eq!(files.len(), 2);
    let added = files.iter().find(|f| f.status == Status::Added).expect("an Added record");
    assert_eq!(added.path_new.as_deref(), Some("new_name.py"));
    assert!(added.path_old.is_none());

    let deleted = files.iter().find(|f| f.status == Status::Deleted).expect("a Deleted record");
    assert_eq!(deleted.path_old.as_deref(), Some("old_name.py"));
    assert!(deleted.path_new.is_none());

    assert!(notes.iter().any(|n| n.contains("downgraded to add+delete")));
}
