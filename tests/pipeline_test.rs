use repodiff::config::Config;
use repodiff::error::{PipelineError, Result as PipelineResult};
use repodiff::model::Envelope;
use repodiff::pipeline::run_with_driver;
use repodiff::utils::git_operations::{FileMetadata, GitDriver, RawNameStatusRecord, Workspace};

/// A driver whose entire history is one added file, used to exercise
/// the orchestration wiring without a real `git` binary.
struct SingleAddDriver;

impl GitDriver for SingleAddDriver {
    fn detect_version(&self) -> PipelineResult<String> {
        Ok("2.43.0".to_string())
    }
    fn ensure_workspace(&self, _: &str, _: &[&str], _: Option<&str>) -> PipelineResult<Workspace> {
        Ok(Workspace::for_test(std::path::PathBuf::from("/nonexistent")))
    }
    fn name_status(&self, _: &Workspace, _: &str, _: &str, _: u8) -> PipelineResult<Vec<RawNameStatusRecord>> {
        Ok(vec![RawNameStatusRecord {
            status_letter: 'A',
            score: None,
            path_a: "new_file.txt".to_string(),
            path_b: None,
        }])
    }
    fn file_metadata(&self, _: &Workspace, _: &str, _: &str) -> PipelineResult<FileMetadata> {
        Ok(FileMetadata { mode: Some("100644".to_string()), size: Some(12), is_binary: false, is_submodule: false })
    }
    fn unified_patch(
        &self,
        _: &Workspace,
        _: &str,
        _: &str,
        _: Option<&str>,
        _: Option<&str>,
        _: u32,
    ) -> PipelineResult<String> {
        Ok("@@ -0,0 +1,1 @@\n+hello world\n".to_string())
    }
    fn submodule_shas(&self, _: &Workspace, _: &str, _: &str, _: &str) -> PipelineResult<(String, String)> {
        Ok((String::new(), String::new()))
    }
}

#[test]
fn end_to_end_single_add_produces_ok_envelope_with_checksum() {
    let driver = SingleAddDriver;
    let config = Config::new("https://example.test/repo.git", "aaa", "bbb");
    let envelope = run_with_driver(&driver, config);
    assert!(envelope.is_ok());
    match envelope {
        Envelope::Ok { data, .. } => {
            assert_eq!(data.files.len(), 1);
            assert_eq!(data.files[0].path_new.as_deref(), Some("new_file.txt"));
            assert!(!data.provenance.checksum.is_empty());
            assert_eq!(data.omitted_files_count, 0);
        }
        Envelope::Err { .. } => panic!("expected ok envelope"),
    }
}

struct BadVersionDriver;
impl GitDriver for BadVersionDriver {
    fn detect_version(&self) -> PipelineResult<String> {
        Err(PipelineError::GitVersionUnsupported { detected: "1.9.0".to_string() })
    }
    fn ensure_workspace(&self, _: &str, _: &[&str], _: Option<&str>) -> PipelineResult<Workspace> {
        unreachable!()
    }
    fn name_status(&self, _: &Workspace, _: &str, _: &str, _: u8) -> PipelineResult<Vec<RawNameStatusRecord>> {
        unreachable!()
    }
    fn file_metadata(&self, _: &Workspace, _: &str, _: &str) -> PipelineResult<FileMetadata> {
        unreachable!()
    }
    fn unified_patch(
        &self,
        _: &Workspace,
        _: &str,
        _: &str,
        _: Option<&str>,
        _: Option<&str>,
        _: u32,
    ) -> PipelineResult<String> {
        unreachable!()
    }
    fn submodule_shas(&self, _: &Workspace, _: &str, _: &str, _: &str) -> PipelineResult<(String, String)> {
        unreachable!()
    }
}

#[test]
fn invalid_git_version_surfaces_as_error_envelope() {
    let envelope = run_with_driver(&BadVersionDriver, Config::new("u", "a", "b"));
    assert!(!envelope.is_ok());
    match envelope {
        Envelope::Err { error, .. } => assert_eq!(error.code, "GIT_VERSION_UNSUPPORTED"),
        Envelope::Ok { .. } => panic!("expected error envelope"),
    }
}

/// A driver with many modified files, used to exercise the bounded
/// parallel `unified_patch` fan-out (spec.md §5) and confirm that
/// reassembly still lands every hunk on the right file regardless of
/// which worker thread fetched it.
struct ManyFilesDriver {
    paths: Vec<String>,
}

impl GitDriver for ManyFilesDriver {
    fn detect_version(&self) -> PipelineResult<String> {
        Ok("2.43.0".to_string())
    }
    fn ensure_workspace(&self, _: &str, _: &[&str], _: Option<&str>) -> PipelineResult<Workspace> {
        Ok(Workspace::for_test(std::path::PathBuf::from("/nonexistent")))
    }
    fn name_status(&self, _: &Workspace, _: &str, _: &str, _: u8) -> PipelineResult<Vec<RawNameStatusRecord>> {
        Ok(self
            .paths
            .iter()
            .map(|p| RawNameStatusRecord {
                status_letter: 'M',
                score: None,
                path_a: p.clone(),
                path_b: None,
            })
            .collect())
    }
    fn file_metadata(&self, _: &Workspace, _: &str, _: &str) -> PipelineResult<FileMetadata> {
        Ok(FileMetadata { mode: Some("100644".to_string()), size: Some(3), is_binary: false, is_submodule: false })
    }
    fn unified_patch(
        &self,
        _: &Workspace,
        _: &str,
        _: &str,
        path_old: Option<&str>,
        _: Option<&str>,
        _: u32,
    ) -> PipelineResult<String> {
        let path = path_old.unwrap_or("");
        Ok(format!("@@ -1,1 +1,1 @@\n-old\n+{path}\n"))
    }
    fn submodule_shas(&self, _: &Workspace, _: &str, _: &str, _: &str) -> PipelineResult<(String, String)> {
        Ok((String::new(), String::new()))
    }
}

#[test]
fn parallel_extraction_reassembles_every_file_in_fixed_order() {
    let paths: Vec<String> = (0..40).map(|i| format!("file_{i:02}.txt")).collect();
    let driver = ManyFilesDriver { paths: paths.clone() };
    let envelope = run_with_driver(&driver, Config::new("u", "a", "b"));
    match envelope {
        Envelope::Ok { data, .. } => {
            let mut sorted_paths = paths.clone();
            sorted_paths.sort();
            let emitted: Vec<&str> = data.files.iter().map(|f| f.path_new.as_deref().unwrap()).collect();
            assert_eq!(emitted, sorted_paths);
            for file in &data.files {
                let expected_tail = file.path_new.as_deref().unwrap();
                assert_eq!(file.hunks.len(), 1);
                assert!(file.hunks[0].patch.ends_with(expected_tail));
            }
        }
        Envelope::Err { .. } => panic!("expected ok envelope"),
    }
}

struct FailingPatchDriver;
impl GitDriver for FailingPatchDriver {
    fn detect_version(&self) -> PipelineResult<String> {
        Ok("2.43.0".to_string())
    }
    fn ensure_workspace(&self, _: &str, _: &[&str], _: Option<&str>) -> PipelineResult<Workspace> {
        Ok(Workspace::for_test(std::path::PathBuf::from("/nonexistent")))
    }
    fn name_status(&self, _: &Workspace, _: &str, _: &str, _: u8) -> PipelineResult<Vec<RawNameStatusRecord>> {
        Ok(vec![RawNameStatusRecord {
            status_letter: 'M',
            score: None,
            path_a: "a.txt".to_string(),
            path_b: None,
        }])
    }
    fn file_metadata(&self, _: &Workspace, _: &str, _: &str) -> PipelineResult<FileMetadata> {
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
    ) -> PipelineResult<String> {
        Err(PipelineError::Internal { message: "diff failed".to_string() })
    }
    fn submodule_shas(&self, _: &Workspace, _: &str, _: &str, _: &str) -> PipelineResult<(String, String)> {
        Ok((String::new(), String::new()))
    }
}

#[test]
fn driver_error_during_patch_extraction_surfaces_as_internal_error() {
    let envelope = run_with_driver(&FailingPatchDriver, Config::new("u", "a", "b"));
    match envelope {
        Envelope::Err { error, .. } => assert_eq!(error.code, "INTERNAL_ERROR"),
        Envelope::Ok { .. } => panic!("expected error envelope"),
    }
}
