//! Full runs against an in-process provider serving real ZIP archives

use kiln_core::{Clock, KilnError, Result};
use kiln_gen::materialize::materialize_payload;
use kiln_gen::{
    generate_model, AssetUploader, DownloadedFile, GenerationRequest, JobHandle, JobProvider,
    JobResult, JobStatus, JobSubmission, PollPolicy, ResultFile, RunOptions, RunRecord, ViewKind,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use zip::write::SimpleFileOptions;

const ARCHIVE_URL: &str = "https://cdn.example.com/results/job.zip";

#[derive(Default)]
struct ManualClock {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
        self.now += duration;
    }
}

/// Reports RUN `running_polls` times, then `terminal`; downloads serve `archive`
struct StubProvider {
    running_polls: u32,
    terminal: JobResult,
    archive: Vec<u8>,
    polls: AtomicU32,
    downloads: AtomicU32,
    submissions: Mutex<Vec<JobSubmission>>,
    /// 1-based poll number that fails with a transport error
    poll_error_on: Option<u32>,
    /// Transport error returned instead of the archive
    download_error: Option<String>,
}

impl StubProvider {
    fn new(running_polls: u32, terminal: JobResult, archive: Vec<u8>) -> Self {
        Self {
            running_polls,
            terminal,
            archive,
            polls: AtomicU32::new(0),
            downloads: AtomicU32::new(0),
            submissions: Mutex::new(Vec::new()),
            poll_error_on: None,
            download_error: None,
        }
    }

    fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    fn downloads(&self) -> u32 {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl JobProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn submit(&self, submission: &JobSubmission) -> Result<JobHandle> {
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(JobHandle::new("1357924680"))
    }

    fn poll(&self, job: &JobHandle) -> Result<JobResult> {
        assert_eq!(job.id(), "1357924680");
        let n = self.polls.fetch_add(1, Ordering::SeqCst);
        if self.poll_error_on == Some(n + 1) {
            return Err(KilnError::ProviderPoll("DescribeTask: 502 Bad Gateway".to_string()));
        }
        if n < self.running_polls {
            Ok(JobResult::in_progress(JobStatus::Running))
        } else {
            Ok(self.terminal.clone())
        }
    }

    fn download_result(&self, result: &JobResult, output_dir: &Path) -> Result<Vec<DownloadedFile>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = &self.download_error {
            return Err(KilnError::Download(msg.clone()));
        }
        let url = result
            .archive_url()
            .ok_or_else(|| KilnError::Download("no url".to_string()))?;
        materialize_payload(&self.archive, url, output_dir)
    }
}

struct StubUploader {
    uploads: Mutex<Vec<PathBuf>>,
}

impl AssetUploader for StubUploader {
    fn upload_file(&self, path: &Path) -> Result<String> {
        self.uploads.lock().unwrap().push(path.to_path_buf());
        Ok(format!(
            "https://bucket.example.com/kiln/{}",
            path.file_name().unwrap().to_string_lossy()
        ))
    }
}

fn build_zip(entries: &[(&str, usize)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, size) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(&vec![b'v'; *size]).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn done_result() -> JobResult {
    JobResult::done(vec![ResultFile {
        kind: "OBJ".to_string(),
        url: ARCHIVE_URL.to_string(),
        preview_image_url: None,
    }])
}

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("kiln_pipeline_test_{}", uuid::Uuid::new_v4()))
}

#[test]
fn test_prompt_run_extracts_archive_and_records_largest_mesh() {
    let archive = build_zip(&[
        ("model_a.obj", 500),
        ("model_b.obj", 12000),
        ("material.mtl", 80),
        ("textures/texture.png", 900),
    ]);
    let provider = StubProvider::new(3, done_result(), archive);
    let dir = temp_dir();
    let mut clock = ManualClock::default();

    let outcome = generate_model(
        &GenerationRequest::from_prompt("a cute panda figurine"),
        &RunOptions::new(&dir),
        &provider,
        None,
        &mut clock,
    )
    .unwrap();

    assert!(outcome.is_success());
    assert_eq!(provider.polls(), 4);
    assert_eq!(provider.downloads(), 1);
    assert_eq!(outcome.files.len(), 4);
    assert_eq!(outcome.canonical, Some(dir.join("model_b.obj")));
    assert!(dir.join("textures").join("texture.png").is_file());

    let secs: Vec<f64> = clock.sleeps.iter().map(|d| d.as_secs_f64()).collect();
    assert_eq!(secs, vec![10.0, 15.0, 22.5, 33.75]);
    assert_eq!(outcome.elapsed, Duration::from_secs_f64(81.25));

    let record = RunRecord::load(&outcome.record_path).unwrap();
    assert_eq!(outcome.record_path, dir.join("metadata.json"));
    assert_eq!(record.job_id, "1357924680");
    assert_eq!(record.status, JobStatus::Done);
    assert_eq!(record.input_type, "prompt");
    assert_eq!(record.input_value, "a cute panda figurine");
    assert_eq!(record.canonical_artifact.as_deref(), Some("model_b.obj"));
    assert_eq!(record.files.len(), 4);
    assert!(record.error_message.is_none());
    assert!((record.elapsed_seconds - 81.25).abs() < 1e-9);

    let submissions = provider.submissions.lock().unwrap();
    assert_eq!(submissions[0].prompt.as_deref(), Some("a cute panda figurine"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_multi_view_run_uploads_every_local_image() {
    let provider = StubProvider::new(0, done_result(), build_zip(&[("mesh.obj", 10)]));
    let uploader = StubUploader {
        uploads: Mutex::new(Vec::new()),
    };
    let request = GenerationRequest::from_image("front.png")
        .with_view(ViewKind::Left, "left.png")
        .unwrap()
        .with_view(ViewKind::Right, "right.png")
        .unwrap();
    let dir = temp_dir();

    let outcome = generate_model(
        &request,
        &RunOptions::new(&dir),
        &provider,
        Some(&uploader),
        &mut ManualClock::default(),
    )
    .unwrap();

    assert!(outcome.is_success());
    assert_eq!(uploader.uploads.lock().unwrap().len(), 3);

    let submissions = provider.submissions.lock().unwrap();
    let submission = &submissions[0];
    assert_eq!(
        submission.image_url.as_deref(),
        Some("https://bucket.example.com/kiln/front.png")
    );
    let views: Vec<ViewKind> = submission.multi_view_images.iter().map(|v| v.view).collect();
    assert_eq!(views, vec![ViewKind::Left, ViewKind::Right]);

    let record = RunRecord::load(&outcome.record_path).unwrap();
    assert_eq!(record.input_type, "image");
    assert_eq!(record.input_value, "front.png");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_remote_failure_is_recorded_not_raised() {
    let provider = StubProvider::new(2, JobResult::failed("quota exceeded"), Vec::new());
    let dir = temp_dir();

    let outcome = generate_model(
        &GenerationRequest::from_image_url("https://example.com/front.png"),
        &RunOptions::new(&dir),
        &provider,
        None,
        &mut ManualClock::default(),
    )
    .unwrap();

    assert_eq!(outcome.status, JobStatus::Fail);
    assert_eq!(outcome.error_message.as_deref(), Some("quota exceeded"));
    assert_eq!(provider.downloads(), 0);
    assert!(outcome.files.is_empty());

    let record = RunRecord::load(&outcome.record_path).unwrap();
    assert_eq!(record.status, JobStatus::Fail);
    assert_eq!(record.error_message.as_deref(), Some("quota exceeded"));
    assert!(record.canonical_artifact.is_none());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_timeout_leaves_no_record() {
    let provider = StubProvider::new(u32::MAX, done_result(), Vec::new());
    let dir = temp_dir();
    let policy = PollPolicy {
        timeout: Duration::from_secs(120),
        ..PollPolicy::default()
    };

    let err = generate_model(
        &GenerationRequest::from_prompt("a panda"),
        &RunOptions::new(&dir).with_policy(policy),
        &provider,
        None,
        &mut ManualClock::default(),
    )
    .unwrap_err();

    match err {
        KilnError::JobTimeout {
            job_id,
            timeout_secs,
            last_status,
            ..
        } => {
            assert_eq!(job_id, "1357924680");
            assert_eq!(timeout_secs, 120);
            assert_eq!(last_status, "RUNNING");
        }
        other => panic!("expected timeout, got {other}"),
    }
    assert_eq!(provider.downloads(), 0);
    assert!(!dir.join("metadata.json").exists());
}

#[test]
fn test_archive_without_mesh_has_no_canonical() {
    let provider = StubProvider::new(0, done_result(), build_zip(&[("preview.png", 64)]));
    let dir = temp_dir();

    let outcome = generate_model(
        &GenerationRequest::from_prompt("a panda"),
        &RunOptions::new(&dir),
        &provider,
        None,
        &mut ManualClock::default(),
    )
    .unwrap();

    assert!(outcome.canonical.is_none());
    let record = RunRecord::load(&outcome.record_path).unwrap();
    assert!(record.canonical_artifact.is_none());
    assert_eq!(record.files, vec!["preview.png"]);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_corrupt_archive_is_download_error() {
    let mut archive = b"PK\x03\x04".to_vec();
    archive.extend_from_slice(&[0u8; 32]);
    let provider = StubProvider::new(0, done_result(), archive);
    let dir = temp_dir();

    let err = generate_model(
        &GenerationRequest::from_prompt("a panda"),
        &RunOptions::new(&dir),
        &provider,
        None,
        &mut ManualClock::default(),
    )
    .unwrap_err();

    assert!(matches!(err, KilnError::Download(_)));
    assert!(!dir.join("metadata.json").exists());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_download_failure_after_done_names_job() {
    let mut provider = StubProvider::new(2, done_result(), Vec::new());
    provider.download_error = Some(format!("GET {} failed: timeout", ARCHIVE_URL));
    let dir = temp_dir();

    let err = generate_model(
        &GenerationRequest::from_prompt("a panda"),
        &RunOptions::new(&dir),
        &provider,
        None,
        &mut ManualClock::default(),
    )
    .unwrap_err();

    match err {
        KilnError::Download(msg) => {
            assert!(msg.contains("1357924680"), "{msg}");
            assert!(msg.contains("last status DONE"), "{msg}");
            assert!(msg.contains("elapsed 47.5s"), "{msg}");
            assert!(msg.contains("timeout"), "{msg}");
        }
        other => panic!("expected download error, got {other}"),
    }
    assert_eq!(provider.downloads(), 1);
    assert!(!dir.join("metadata.json").exists());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_poll_transport_error_aborts_run() {
    let mut provider = StubProvider::new(5, done_result(), build_zip(&[("model.obj", 16)]));
    provider.poll_error_on = Some(3);
    let dir = temp_dir();
    let mut clock = ManualClock::default();

    let err = generate_model(
        &GenerationRequest::from_prompt("a panda"),
        &RunOptions::new(&dir),
        &provider,
        None,
        &mut clock,
    )
    .unwrap_err();

    match err {
        KilnError::ProviderPoll(msg) => {
            assert!(msg.contains("1357924680"), "{msg}");
            assert!(msg.contains("last status RUNNING"), "{msg}");
            assert!(msg.contains("502"), "{msg}");
        }
        other => panic!("expected poll error, got {other}"),
    }
    assert_eq!(provider.polls(), 3);
    assert_eq!(clock.sleeps.len(), 3);
    assert_eq!(provider.downloads(), 0);
    assert!(!dir.join("metadata.json").exists());
    std::fs::remove_dir_all(&dir).ok();
}
