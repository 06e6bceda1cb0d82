//! Sequential bundle download.
//!
//! A file whose destination path already exists is skipped without looking
//! at its size or content. Two processes downloading into the same
//! directory can both pass the existence check; nothing locks it.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bundle::{Bundle, FileEntry};
use crate::client::Client;
use crate::error::{Error, Result, http_error};
use crate::status::StatusSnapshot;
use crate::util::base_name;

const CHUNK_SIZE: usize = 8192;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub downloaded: usize,
    pub skipped: usize,
    /// Base names of files whose transfer failed.
    pub failed: Vec<String>,
}

impl Client {
    /// Downloads every file of a finished task into `dest`.
    ///
    /// Returns [`Error::TaskNotComplete`] without touching the filesystem
    /// while the task is still queued or processing, and
    /// [`Error::TaskFailed`] when it ended in any status other than `done`.
    pub fn download(
        &self,
        task_id: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<DownloadReport> {
        let token = self.bearer()?;

        match self.status_with(&token, task_id)? {
            snapshot if snapshot.is_done() => {}
            StatusSnapshot::Status(status)
                if !matches!(status.as_str(), "pending" | "queued" | "processing") =>
            {
                return Err(Error::TaskFailed {
                    task_id: task_id.to_string(),
                    status,
                });
            }
            _ => {
                return Err(Error::TaskNotComplete {
                    task_id: task_id.to_string(),
                });
            }
        }

        let bundle = self.bundle_with(&token, task_id)?;
        self.download_bundle(&token, &bundle, dest, cancel)
    }

    fn download_bundle(
        &self,
        token: &str,
        bundle: &Bundle,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<DownloadReport> {
        let mut report = DownloadReport::default();
        if bundle.is_empty() {
            info!("Task {} has no files to download", bundle.task_id);
            return Ok(report);
        }
        let total = bundle.len();

        for (i, file) in bundle.files.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let name = base_name(&file.file_name);
            let target = dest.join(name);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }

            if target.exists() {
                info!("File {} already exists. Skipping download", name);
                report.skipped += 1;
                continue;
            }

            info!("Downloading {} of {}: {}", i + 1, total, name);
            match self.fetch_file(token, &bundle.task_id, file, &target, cancel) {
                Ok(_) => report.downloaded += 1,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    warn!(file = %name, error = %e, "download failed, moving on");
                    report.failed.push(name.to_string());
                }
            }
        }

        Ok(report)
    }

    /// Streams one file to `<target>.part`, renamed into place when complete.
    fn fetch_file(
        &self,
        token: &str,
        task_id: &str,
        file: &FileEntry,
        target: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let url = self.endpoint(&format!("bundle/{}/{}", task_id, file.file_id));
        let partial = part_path(target);

        let result = self.stream_to(&url, token, file.file_size_bytes, &partial, cancel);
        match result {
            Ok(written) => {
                std::fs::rename(&partial, target)?;
                Ok(written)
            }
            Err(e) => {
                let _ = std::fs::remove_file(&partial);
                Err(e)
            }
        }
    }

    fn stream_to(
        &self,
        url: &str,
        token: &str,
        expected: u64,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        // Redirects to the storage backend are followed by the HTTP client.
        let mut resp = self.apply_auth(self.http.get(url), Some(token)).send()?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(http_error(status, url, &text));
        }

        let pb = if self.progress {
            let pb = ProgressBar::new(expected);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} {bytes}/{total_bytes} ({bytes_per_sec}) {wide_bar} {eta}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
            );
            Some(pb)
        } else {
            None
        };

        let mut out = File::create(path)?;
        let mut buf = [0u8; CHUNK_SIZE];
        let mut written: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let n = resp.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])?;
            written += n as u64;
            if let Some(pb) = &pb {
                pb.inc(n as u64);
            }
        }
        out.flush()?;

        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }
        Ok(written)
    }
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}
