//! Screenshots and the run record on disk.
//!
//! Artifacts are named `{step_index:03}_{label}.png` inside the output
//! directory and are never overwritten within a run. Artifacts and the run
//! record left by an earlier run are removed before a new run starts.

use crate::reporter::RunResult;
use crate::result::{ProofError, ProofResult};
use crate::session::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Label used for the artifact captured when a step fails
pub const FAILURE_LABEL: &str = "failure";

/// File name of the structured run record
pub const RUN_RECORD_FILE: &str = "run_result.json";

/// A written screenshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceArtifact {
    /// Where it was written
    pub path: PathBuf,
    /// Step that produced it
    pub step_index: usize,
    /// When it was written
    pub timestamp: DateTime<Utc>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Hex SHA-256 of the file contents
    pub sha256: String,
}

/// Reduce a label to `[A-Za-z0-9_-]`
#[must_use]
pub fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "capture".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Writes evidence into one output directory
#[derive(Debug, Clone)]
pub struct EvidenceCapture {
    output_dir: PathBuf,
    full_page: bool,
}

impl EvidenceCapture {
    /// Capture into `output_dir`, full-page by default if `full_page`
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, full_page: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            full_page,
        }
    }

    /// Output directory
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Deterministic path for a step's artifact
    #[must_use]
    pub fn artifact_path(&self, step_index: usize, label: &str) -> PathBuf {
        self.output_dir
            .join(format!("{step_index:03}_{}.png", sanitize_label(label)))
    }

    /// Screenshot the page and write it
    ///
    /// # Errors
    ///
    /// Driver errors from the screenshot, or `Evidence` if the file exists
    /// or cannot be written.
    pub async fn capture(
        &self,
        session: &Session,
        step_index: usize,
        label: &str,
        full_page: Option<bool>,
    ) -> ProofResult<EvidenceArtifact> {
        let full_page = full_page.unwrap_or(self.full_page);
        let png = session.page()?.screenshot(full_page).await?;
        self.store(step_index, label, &png)
    }

    /// Best-effort capture after a failure.
    ///
    /// Never returns an error: a failed capture is logged and yields `None`,
    /// leaving the failure that triggered it as the one reported.
    pub async fn capture_failure(
        &self,
        session: &Session,
        step_index: usize,
    ) -> Option<EvidenceArtifact> {
        match self.capture(session, step_index, FAILURE_LABEL, None).await {
            Ok(artifact) => Some(artifact),
            Err(err) => {
                tracing::warn!(step = step_index, error = %err, "failure evidence not captured");
                None
            }
        }
    }

    /// Write PNG bytes as a step artifact
    ///
    /// # Errors
    ///
    /// `Evidence` for undecodable images, existing files and I/O failures.
    pub fn store(&self, step_index: usize, label: &str, png: &[u8]) -> ProofResult<EvidenceArtifact> {
        let path = self.artifact_path(step_index, label);
        let evidence_err = |message: String| ProofError::Evidence {
            path: path.clone(),
            message,
        };

        let (width, height) = image::ImageReader::new(Cursor::new(png))
            .with_guessed_format()
            .map_err(|e| evidence_err(format!("unreadable image: {e}")))?
            .into_dimensions()
            .map_err(|e| evidence_err(format!("unreadable image: {e}")))?;

        fs::create_dir_all(&self.output_dir)
            .map_err(|e| evidence_err(format!("creating output directory: {e}")))?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => evidence_err("artifact already exists".to_string()),
                _ => evidence_err(e.to_string()),
            })?;
        file.write_all(png)
            .and_then(|()| file.sync_all())
            .map_err(|e| evidence_err(e.to_string()))?;

        let artifact = EvidenceArtifact {
            path,
            step_index,
            timestamp: Utc::now(),
            width,
            height,
            sha256: format!("{:x}", Sha256::digest(png)),
        };
        tracing::info!(path = %artifact.path.display(), width, height, "evidence captured");
        Ok(artifact)
    }

    /// Remove step artifacts and the run record left by a previous run.
    ///
    /// Only `NNN_label.png` files and `run_result.json` are touched; anything
    /// else in the directory is left alone. Returns how many files went.
    ///
    /// # Errors
    ///
    /// `Evidence` if the directory cannot be listed or a file cannot be removed.
    pub fn clear_previous(&self) -> ProofResult<usize> {
        let entries = match fs::read_dir(&self.output_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(ProofError::Evidence {
                    path: self.output_dir.clone(),
                    message: format!("listing output directory: {e}"),
                })
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name != RUN_RECORD_FILE && !is_step_artifact(name) {
                continue;
            }
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            fs::remove_file(&path).map_err(|e| ProofError::Evidence {
                path: path.clone(),
                message: format!("removing stale artifact: {e}"),
            })?;
            removed += 1;
        }
        if removed > 0 {
            tracing::info!(dir = %self.output_dir.display(), removed, "stale evidence removed");
        }
        Ok(removed)
    }

    /// Write `run_result.json`, replacing any previous record
    ///
    /// # Errors
    ///
    /// `Evidence` if the directory or file cannot be written.
    pub fn write_run_record(&self, result: &RunResult) -> ProofResult<PathBuf> {
        let path = self.output_dir.join(RUN_RECORD_FILE);
        let json = serde_json::to_string_pretty(result)?;
        fs::create_dir_all(&self.output_dir)
            .and_then(|()| fs::write(&path, json))
            .map_err(|e| ProofError::Evidence {
                path: path.clone(),
                message: e.to_string(),
            })?;
        tracing::debug!(path = %path.display(), "run record written");
        Ok(path)
    }
}

/// `NNN_label.png` as produced by [`EvidenceCapture::artifact_path`]
fn is_step_artifact(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".png") else {
        return false;
    };
    let Some((index, label)) = stem.split_once('_') else {
        return false;
    };
    index.len() >= 3
        && index.bytes().all(|b| b.is_ascii_digit())
        && !label.is_empty()
        && sanitize_label(label) == label
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbImage::from_pixel(width, height, Rgb([10, 20, 30]))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    mod label_tests {
        use super::*;

        #[test]
        fn test_sanitize() {
            assert_eq!(sanitize_label("filtered"), "filtered");
            assert_eq!(sanitize_label("after click/Sol"), "after_click_Sol");
            assert_eq!(sanitize_label("../../etc"), "etc");
            assert_eq!(sanitize_label("  "), "capture");
            assert_eq!(sanitize_label("ünï"), "capture");
        }

        #[test]
        fn test_artifact_path() {
            let capture = EvidenceCapture::new("/tmp/out", false);
            assert_eq!(
                capture.artifact_path(4, "filtered"),
                PathBuf::from("/tmp/out/004_filtered.png")
            );
            assert_eq!(
                capture.artifact_path(12, "failure"),
                PathBuf::from("/tmp/out/012_failure.png")
            );
        }
    }

    mod store_tests {
        use super::*;

        #[test]
        fn test_store_records_dimensions_and_digest() {
            let dir = tempfile::tempdir().unwrap();
            let capture = EvidenceCapture::new(dir.path().join("nested"), false);
            let bytes = png(64, 32);
            let artifact = capture.store(2, "home", &bytes).unwrap();

            assert_eq!(artifact.path, dir.path().join("nested/002_home.png"));
            assert_eq!((artifact.width, artifact.height), (64, 32));
            assert_eq!(artifact.sha256.len(), 64);
            assert_eq!(fs::read(&artifact.path).unwrap(), bytes);
        }

        #[test]
        fn test_write_once() {
            let dir = tempfile::tempdir().unwrap();
            let capture = EvidenceCapture::new(dir.path(), false);
            capture.store(0, "x", &png(4, 4)).unwrap();
            let err = capture.store(0, "x", &png(8, 8)).unwrap_err();
            assert!(matches!(err, ProofError::Evidence { .. }));
            assert!(err.to_string().contains("already exists"));
        }

        #[test]
        fn test_clear_previous_only_touches_run_output() {
            let dir = tempfile::tempdir().unwrap();
            let capture = EvidenceCapture::new(dir.path(), false);
            capture.store(1, "home", &png(4, 4)).unwrap();
            capture.store(3, "failure", &png(4, 4)).unwrap();
            fs::write(dir.path().join(RUN_RECORD_FILE), "{}").unwrap();
            fs::write(dir.path().join("notes.txt"), "keep").unwrap();
            fs::write(dir.path().join("logo.png"), "keep").unwrap();

            assert_eq!(capture.clear_previous().unwrap(), 3);
            assert!(!capture.artifact_path(1, "home").exists());
            assert!(!dir.path().join(RUN_RECORD_FILE).exists());
            assert!(dir.path().join("notes.txt").exists());
            assert!(dir.path().join("logo.png").exists());

            capture.store(1, "home", &png(4, 4)).unwrap();
        }

        #[test]
        fn test_clear_previous_missing_dir() {
            let dir = tempfile::tempdir().unwrap();
            let capture = EvidenceCapture::new(dir.path().join("absent"), false);
            assert_eq!(capture.clear_previous().unwrap(), 0);
        }

        #[test]
        fn test_step_artifact_names() {
            assert!(is_step_artifact("004_filtered.png"));
            assert!(is_step_artifact("1200_after-click.png"));
            assert!(!is_step_artifact("04_filtered.png"));
            assert!(!is_step_artifact("abc_filtered.png"));
            assert!(!is_step_artifact("004_.png"));
            assert!(!is_step_artifact("004_filtered.jpg"));
        }

        #[test]
        fn test_rejects_non_image() {
            let dir = tempfile::tempdir().unwrap();
            let capture = EvidenceCapture::new(dir.path(), false);
            assert!(capture.store(0, "x", b"not a png").is_err());
            assert!(!capture.artifact_path(0, "x").exists());
        }
    }
}
