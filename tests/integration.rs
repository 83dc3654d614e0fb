//! Integration tests for archive-sweep

#[path = "../src/archive/fixture.rs"]
mod fixture;

use archive_sweep::{
    archive::ZipSource,
    search::{CandidateStream, Catalog, Charset, StreamEvent},
    types::{CheckMethod, CheckOutcome, SweepConfig, WrongKind},
    CheckerSource, PasswordChecker, SweepError, SweepReport, SweepState, Sweeper, WorkerPool,
};
use assert_cmd::Command;
use async_trait::async_trait;
use fixture::ZipBuilder;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn write_archive(dir: &Path, name: &str, bytes: Vec<u8>) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn quiet_config(workers: usize) -> SweepConfig {
    SweepConfig {
        workers,
        queue_capacity: workers,
        backoff: Duration::from_millis(1),
        ..SweepConfig::default()
    }
}

/// Counts checks against a fixed password
struct CountingChecker {
    password: &'static [u8],
    seen: Arc<Mutex<Vec<Vec<u8>>>>,
}

#[async_trait]
impl PasswordChecker for CountingChecker {
    async fn check(&self, candidate: &[u8]) -> CheckOutcome {
        self.seen.lock().unwrap().push(candidate.to_vec());
        if candidate == self.password {
            CheckOutcome::Success
        } else {
            CheckOutcome::WrongPassword(WrongKind::Reported)
        }
    }

    fn method_name(&self) -> CheckMethod {
        CheckMethod::SevenZip
    }
}

#[derive(Clone)]
struct CountingSource {
    password: &'static [u8],
    seen: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl CountingSource {
    fn new(password: &'static [u8]) -> Self {
        Self {
            password,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl CheckerSource for CountingSource {
    fn open(&self) -> archive_sweep::Result<Box<dyn PasswordChecker>> {
        Ok(Box::new(CountingChecker {
            password: self.password,
            seen: Arc::clone(&self.seen),
        }))
    }
}

#[test]
fn test_word_list_against_real_archive() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(
        dir.path(),
        "hello-aes.zip",
        ZipBuilder::new()
            .directory("docs/")
            .aes_deflated("docs/hello.txt", b"hello, world\n", b"golang")
            .finish(),
    );

    let candidates: Vec<Vec<u8>> = ["foobar", "batman", "aabaob", "golang"]
        .iter()
        .map(|w| w.as_bytes().to_vec())
        .collect();

    let source = Arc::new(ZipSource::new(&archive));
    let found = tokio_test::block_on(WorkerPool::new(2).search(source, candidates)).unwrap();
    assert_eq!(found, Some(b"golang".to_vec()));
}

#[tokio::test]
async fn test_nothing_checked_after_password() {
    let source = CountingSource::new(b"golang");
    let candidates: Vec<Vec<u8>> = ["foobar", "batman", "aabaob", "golang", "zebra", "yak"]
        .iter()
        .map(|w| w.as_bytes().to_vec())
        .collect();

    let found = WorkerPool::new(1).search(Arc::new(source.clone()), candidates).await.unwrap();

    assert_eq!(found, Some(b"golang".to_vec()));
    let seen = source.seen.lock().unwrap().clone();
    assert_eq!(seen.last(), Some(&b"golang".to_vec()));
    assert_eq!(seen.len(), 4);
}

#[tokio::test]
async fn test_sweep_cracks_zipcrypto_archive() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(
        dir.path(),
        "legacy.zip",
        ZipBuilder::new()
            .plain("README", b"not secret")
            .zipcrypto("secret.txt", b"attack at dawn", b"b2")
            .finish(),
    );
    let catalog = Catalog::new(vec![Charset::new(b"ab"), Charset::new(b"ab12")], vec![1, 2]).unwrap();

    let report = Sweeper::new(quiet_config(3), &archive)
        .unwrap()
        .with_catalog(catalog)
        .run()
        .await
        .unwrap();

    assert_eq!(report.password(), Some(&b"b2"[..]));
}

#[tokio::test]
async fn test_sweep_exhausts_without_match() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(
        dir.path(),
        "aes.zip",
        ZipBuilder::new().aes("a.txt", b"payload", b"zzz").finish(),
    );
    let catalog = Catalog::new(vec![Charset::new(b"xy")], vec![1, 2]).unwrap();

    let report = Sweeper::new(quiet_config(2), &archive)
        .unwrap()
        .with_catalog(catalog)
        .run()
        .await
        .unwrap();

    match report {
        SweepReport::NotFound { stats } => assert_eq!(stats.checked, 2 + 4),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unencrypted_archive_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(
        dir.path(),
        "plain.zip",
        ZipBuilder::new().plain("a.txt", b"open").finish(),
    );

    let err = Sweeper::new(quiet_config(2), &archive)
        .unwrap()
        .with_catalog(Catalog::new(vec![Charset::new(b"a")], vec![1]).unwrap())
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, SweepError::Archive { .. }));
}

#[tokio::test]
async fn test_candidate_counts_are_reproducible() {
    let catalog = Catalog::new(
        vec![Charset::lower(), Charset::merge(&[&Charset::lower(), &Charset::digits()])],
        vec![2, 1],
    )
    .unwrap();

    let mut counts = Vec::new();
    for workers in [1, 8] {
        let source = CountingSource::new(b"\x00never");
        let report = Sweeper::new(quiet_config(workers), "unused.zip")
            .unwrap()
            .with_catalog(catalog.clone())
            .with_source(Arc::new(source.clone()))
            .run()
            .await
            .unwrap();
        assert!(report.password().is_none());
        counts.push((report.stats().checked, source.seen.lock().unwrap().len()));
    }

    // 36^2 + 36: the dedup filter removes everything lower-only from the
    // second pass of each length.
    assert_eq!(counts[0], (36 * 36 + 36, 36 * 36 + 36));
    assert_eq!(counts[0], counts[1]);
}

#[test]
fn test_stream_matches_catalog_size_for_standard_single_length() {
    let catalog = Catalog::new(
        vec![
            Charset::lower(),
            Charset::merge(&[&Charset::lower(), &Charset::digits()]),
            Charset::merge(&[&Charset::lower(), &Charset::upper(), &Charset::digits()]),
        ],
        vec![2],
    )
    .unwrap();
    let emitted = CandidateStream::new(&catalog)
        .unwrap()
        .filter(|e| matches!(e, StreamEvent::Candidate(_)))
        .count();
    assert_eq!(emitted, 62 * 62);
}

#[tokio::test]
async fn test_checkpoint_roundtrip_through_sweeper() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    let catalog = Catalog::new(vec![Charset::new(b"abc")], vec![2]).unwrap();

    let mut saved = SweepState::new("target.zip");
    saved.update_progress(Some("ca".to_string()), 6, 6);
    saved.save(&state_path).unwrap();

    let mut config = quiet_config(1);
    config.state_file = Some(state_path.clone());
    let source = CountingSource::new(b"\x00never");
    Sweeper::new(config, "target.zip")
        .unwrap()
        .with_catalog(catalog)
        .with_source(Arc::new(source.clone()))
        .run()
        .await
        .unwrap();

    let seen = source.seen.lock().unwrap().clone();
    assert_eq!(seen, vec![b"ca".to_vec(), b"cb".to_vec(), b"cc".to_vec()]);

    let state = SweepState::load(&state_path).unwrap();
    assert!(state.completed);
    assert!(state.found.is_none());
}

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("archive-sweep").unwrap();
    for key in [
        "ARCHIVE_SWEEP_STATE",
        "ARCHIVE_SWEEP_METHOD",
        "ARCHIVE_SWEEP_MAX_RETRIES",
        "ARCHIVE_SWEEP_QUEUE",
    ] {
        cmd.env_remove(key);
    }
    cmd.env("ARCHIVE_SWEEP_WORKERS", "2").env("ARCHIVE_SWEEP_LOG", "warn");
    cmd
}

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("archive-sweep <ARCHIVE> [RESUME]"));
}

#[test]
fn test_cli_version() {
    cli()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("archive-sweep {}", archive_sweep::VERSION)));
}

#[test]
fn test_cli_requires_archive() {
    cli()
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("missing archive path"));
}

#[test]
fn test_cli_missing_archive_file() {
    cli()
        .arg("/definitely/not/here.zip")
        .assert()
        .failure()
        .stderr(predicate::str::contains("archive not found"));
}

#[test]
fn test_cli_rejects_bad_resume() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(
        dir.path(),
        "a.zip",
        ZipBuilder::new().aes("a.txt", b"x", b"golang").finish(),
    );

    cli()
        .arg(&archive)
        .arg("abcdefghi")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Cannot resume from 'abcdefghi'"));
}

#[test]
fn test_cli_recovers_password_from_resume_point() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(
        dir.path(),
        "hello-aes.zip",
        ZipBuilder::new().aes("hello.txt", b"hello", b"golang").finish(),
    );

    cli()
        .arg(&archive)
        .arg("golanf")
        .assert()
        .success()
        .stdout(predicate::eq("golang\n"));
}

#[test]
fn test_cli_bad_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(
        dir.path(),
        "a.zip",
        ZipBuilder::new().aes("a.txt", b"x", b"golang").finish(),
    );

    cli()
        .env("ARCHIVE_SWEEP_WORKERS", "0")
        .arg(&archive)
        .assert()
        .failure()
        .stderr(predicate::str::contains("worker count"));
}
