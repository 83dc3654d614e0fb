//! Password checking against the target archive

#[cfg(feature = "subprocess")]
pub mod sevenzip;
pub mod zip;

#[cfg(test)]
pub(crate) mod fixture;

#[cfg(feature = "subprocess")]
pub use sevenzip::{SevenZipChecker, SevenZipSource};
pub use zip::EncryptedEntry;

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;

use crate::error::{Result, SweepError};
use crate::types::{CheckMethod, CheckOutcome, SweepConfig};

/// Tries one password against an archive
#[async_trait]
pub trait PasswordChecker: Send + Sync {
    /// Attempt `candidate` and classify the result
    async fn check(&self, candidate: &[u8]) -> CheckOutcome;

    /// Get the method name
    fn method_name(&self) -> CheckMethod;
}

/// Opens one checker per worker. Checkers are never shared between workers.
pub trait CheckerSource: Send + Sync {
    fn open(&self) -> Result<Box<dyn PasswordChecker>>;
}

/// Builds [`ZipChecker`]s over one shared entry. The archive is read on the
/// first open; every later checker reuses that entry, or that error.
#[derive(Debug, Clone)]
pub struct ZipSource {
    archive: PathBuf,
    entry: OnceLock<Result<Arc<EncryptedEntry>>>,
}

impl ZipSource {
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            entry: OnceLock::new(),
        }
    }

    pub fn open_checker(&self) -> Result<ZipChecker> {
        let entry = self
            .entry
            .get_or_init(|| {
                let entry = EncryptedEntry::open(&self.archive)?;
                tracing::debug!(
                    archive = %self.archive.display(),
                    entry = %entry.name,
                    method = entry.method,
                    size = entry.uncompressed_size,
                    "Located encrypted entry"
                );
                Ok(Arc::new(entry))
            })
            .clone()?;
        Ok(ZipChecker { entry })
    }
}

impl CheckerSource for ZipSource {
    fn open(&self) -> Result<Box<dyn PasswordChecker>> {
        Ok(Box::new(self.open_checker()?))
    }
}

/// In-process checker over one located entry
pub struct ZipChecker {
    entry: Arc<EncryptedEntry>,
}

impl ZipChecker {
    pub fn entry(&self) -> &Arc<EncryptedEntry> {
        &self.entry
    }
}

#[async_trait]
impl PasswordChecker for ZipChecker {
    async fn check(&self, candidate: &[u8]) -> CheckOutcome {
        // Key derivation is CPU bound; keep it off the async workers.
        let entry = Arc::clone(&self.entry);
        let candidate = candidate.to_vec();
        match tokio::task::spawn_blocking(move || entry.verify(&candidate)).await {
            Ok(outcome) => outcome,
            Err(e) => CheckOutcome::Fatal(SweepError::checker(
                CheckMethod::Zip,
                format!("verification task failed: {}", e),
                None,
            )),
        }
    }

    fn method_name(&self) -> CheckMethod {
        CheckMethod::Zip
    }
}

/// Pick the checker strategy configured for `archive`
pub fn checker_source(config: &SweepConfig, archive: &Path) -> Result<Arc<dyn CheckerSource>> {
    match config.method {
        CheckMethod::Zip => Ok(Arc::new(ZipSource::new(archive))),
        #[cfg(feature = "subprocess")]
        CheckMethod::SevenZip => Ok(Arc::new(SevenZipSource::new(
            config.seven_zip.clone(),
            archive,
        ))),
        #[cfg(not(feature = "subprocess"))]
        CheckMethod::SevenZip => Err(SweepError::config(
            "7z checking was disabled at compile time (feature \"subprocess\")",
        )),
    }
}
