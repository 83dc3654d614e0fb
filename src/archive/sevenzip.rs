//! Out-of-process checker: one `7z` invocation per candidate

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use super::{CheckerSource, PasswordChecker};
use crate::error::{Result, SweepError};
use crate::search::display_candidate;
use crate::types::{CheckMethod, CheckOutcome, WrongKind};

// EMFILE / ENFILE / EAGAIN from spawn: out of descriptors or processes
const EXHAUSTION_ERRNOS: &[i32] = &[24, 23, 11];

fn wrong_password_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)wrong password|data error in encrypted file")
            .expect("static regex is valid")
    })
}

fn exhaustion_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)too many open files|resource temporarily unavailable")
            .expect("static regex is valid")
    })
}

/// Classify `7z` stderr after a non-zero exit
pub fn classify_stderr(stderr: &str) -> Option<CheckOutcome> {
    if wrong_password_pattern().is_match(stderr) {
        Some(CheckOutcome::WrongPassword(WrongKind::Reported))
    } else if exhaustion_pattern().is_match(stderr) {
        Some(CheckOutcome::ResourceExhausted)
    } else {
        None
    }
}

/// Builds [`SevenZipChecker`]s for one archive
#[derive(Debug, Clone)]
pub struct SevenZipSource {
    binary: String,
    archive: PathBuf,
}

impl SevenZipSource {
    pub fn new(binary: impl Into<String>, archive: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            archive: archive.into(),
        }
    }
}

impl CheckerSource for SevenZipSource {
    fn open(&self) -> Result<Box<dyn PasswordChecker>> {
        if !self.archive.is_file() {
            return Err(SweepError::io(
                "archive not found",
                Some(self.archive.to_string_lossy().to_string()),
            ));
        }
        Ok(Box::new(SevenZipChecker {
            binary: self.binary.clone(),
            archive: self.archive.clone(),
        }))
    }
}

/// Runs `7z x -y -so -p<candidate> <archive>` and classifies the result
#[derive(Debug, Clone)]
pub struct SevenZipChecker {
    binary: String,
    archive: PathBuf,
}

#[async_trait]
impl PasswordChecker for SevenZipChecker {
    async fn check(&self, candidate: &[u8]) -> CheckOutcome {
        let password = display_candidate(candidate);
        let output = Command::new(&self.binary)
            .arg("x")
            .arg("-y")
            .arg("-so")
            .arg(format!("-p{}", password))
            .arg(&self.archive)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) if e.raw_os_error().map_or(false, |n| EXHAUSTION_ERRNOS.contains(&n)) => {
                return CheckOutcome::ResourceExhausted;
            }
            Err(e) => {
                return CheckOutcome::Fatal(SweepError::checker(
                    CheckMethod::SevenZip,
                    format!("failed to run {}: {}", self.binary, e),
                    Some(password),
                ));
            }
        };

        if output.status.success() {
            return CheckOutcome::Success;
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        classify_stderr(&stderr).unwrap_or_else(|| {
            tracing::error!(
                binary = %self.binary,
                archive = %self.archive.display(),
                status = %output.status,
                stderr = %stderr.trim(),
                "Unexpected archive tool failure"
            );
            CheckOutcome::Fatal(SweepError::checker(
                CheckMethod::SevenZip,
                format!("{} exited with {}: {}", self.binary, output.status, stderr.trim()),
                Some(password),
            ))
        })
    }

    fn method_name(&self) -> CheckMethod {
        CheckMethod::SevenZip
    }
}
