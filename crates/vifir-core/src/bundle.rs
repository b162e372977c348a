// Diagnostic bundle delivery.
//
// Two stages: drive the server-side generation job to a terminal
// state with periodic progress feedback, then download every produced
// bundle concurrently. Download tasks are fully independent -- one
// failure never cancels a sibling, and the pipeline returns only once
// every task has reached a terminal status.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};
use url::Url;

use vifir_api::{BundleDescriptor, BundleJobState, EntityRef};

use crate::error::CoreError;
use crate::session::Session;

/// How often the generation job is polled for progress.
const GENERATION_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Terminal (or pending) status of one download task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Pending,
    Succeeded { bytes: u64 },
    Failed { reason: String },
}

/// One bundle download with its own independent lifecycle.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    /// Destination filename, taken from the URL's path tail.
    pub file_name: String,
    pub url: String,
    pub status: DownloadStatus,
}

impl DownloadTask {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, DownloadStatus::Succeeded { .. })
    }
}

/// Trigger generation and download everything it produces.
///
/// Overall success is decided by the generation stage alone; downloads
/// are best-effort and individually reported in the returned tasks.
pub async fn request_bundle(
    session: &Session,
    hosts: &[EntityRef],
    output_dir: &Path,
) -> Result<Vec<DownloadTask>, CoreError> {
    let bundles = generate(session, hosts).await?;
    download_all(session, &bundles, output_dir).await
}

/// Submit a generation job and block until it reaches a terminal
/// state, emitting a progress line on every poll.
///
/// The host list is passed through only when talking to a management
/// controller; a single managed node generates for itself. Fails fast
/// with [`CoreError::SessionInvalid`] when not authenticated, and with
/// [`CoreError::BundleGenerationFailed`] when the job cannot be
/// created or ends in failure -- no download stage runs in that case.
pub async fn generate(
    session: &Session,
    hosts: &[EntityRef],
) -> Result<Vec<BundleDescriptor>, CoreError> {
    generate_with_poll_interval(session, hosts, GENERATION_POLL_INTERVAL).await
}

/// [`generate`] with a caller-chosen poll interval.
pub async fn generate_with_poll_interval(
    session: &Session,
    hosts: &[EntityRef],
    poll_interval: Duration,
) -> Result<Vec<BundleDescriptor>, CoreError> {
    let client = session.client()?.clone();

    let host_selection = session.is_management_controller().then_some(hosts);
    let job = client
        .submit_bundle_job(host_selection)
        .await
        .map_err(|e| CoreError::BundleGenerationFailed {
            message: format!("could not create generation job: {e}"),
        })?;
    info!(job = %job, "bundle generation job created; waiting for completion");
    info!("note: the reported percentage is best-effort and may stay at 0% for the whole run");

    let started = Instant::now();
    loop {
        let status = client.bundle_job_status(&job).await.map_err(|e| {
            CoreError::BundleGenerationFailed {
                message: format!("lost track of generation job {job}: {e}"),
            }
        })?;

        match status.state {
            BundleJobState::Running => {
                info!(
                    job = %job,
                    elapsed_secs = started.elapsed().as_secs(),
                    percent = status.progress,
                    "generating support bundle"
                );
                sleep(poll_interval).await;
            }
            BundleJobState::Succeeded => {
                info!(
                    job = %job,
                    bundles = status.bundles.len(),
                    "bundle generation finished"
                );
                return Ok(status.bundles);
            }
            BundleJobState::Failed => {
                return Err(CoreError::BundleGenerationFailed {
                    message: status
                        .error
                        .unwrap_or_else(|| "job reported failure without detail".into()),
                });
            }
        }
    }
}

/// Download every descriptor concurrently into `output_dir`.
///
/// One task per descriptor; a non-200 response or a local write error
/// fails that task alone. Returns after every task has finished, with
/// the per-task outcomes.
pub async fn download_all(
    session: &Session,
    bundles: &[BundleDescriptor],
    output_dir: &Path,
) -> Result<Vec<DownloadTask>, CoreError> {
    // Downloads ride their own client: same proxy/TLS settings and
    // user-agent as the session, but no total request timeout.
    let http = session.client()?.transport().build_download_client()?;

    let progress = MultiProgress::new();
    let mut tasks = JoinSet::new();
    for descriptor in bundles.iter().cloned() {
        let http = http.clone();
        let dir = output_dir.to_path_buf();
        let progress = progress.clone();
        tasks.spawn(async move { download_one(&http, descriptor, &dir, &progress).await });
        debug!("downloader task created");
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(task) => outcomes.push(task),
            Err(join_err) => warn!(error = %join_err, "download task aborted"),
        }
    }
    info!(
        total = outcomes.len(),
        failed = outcomes.iter().filter(|t| !t.succeeded()).count(),
        "all download tasks finished"
    );
    Ok(outcomes)
}

/// Run one download task to its terminal status. Never returns an
/// error: failures are recorded on the task and logged.
async fn download_one(
    http: &reqwest::Client,
    descriptor: BundleDescriptor,
    output_dir: &Path,
    progress: &MultiProgress,
) -> DownloadTask {
    let file_name = file_name_from_url(&descriptor.url, &descriptor.host);
    let mut task = DownloadTask {
        file_name: file_name.clone(),
        url: descriptor.url.clone(),
        status: DownloadStatus::Pending,
    };

    let dest = output_dir.join(&file_name);
    match fetch_to_file(http, &task.url, &dest, progress).await {
        Ok(bytes) => {
            info!(file = %file_name, bytes, "bundle downloaded");
            task.status = DownloadStatus::Succeeded { bytes };
        }
        Err(e) => {
            error!(url = %task.url, error = %e, "bundle download failed");
            task.status = DownloadStatus::Failed {
                reason: e.to_string(),
            };
        }
    }
    task
}

/// Stream one URL to one file through a byte progress meter, then
/// flush and sync before the handle closes.
async fn fetch_to_file(
    http: &reqwest::Client,
    url: &str,
    dest: &Path,
    progress: &MultiProgress,
) -> Result<u64, CoreError> {
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(vifir_api::Error::Transport)?;

    let status = resp.status();
    if status != reqwest::StatusCode::OK {
        return Err(CoreError::DownloadFailed {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }

    let bar = progress.add(match resp.content_length() {
        Some(total) => ProgressBar::new(total).with_style(
            ProgressStyle::with_template(
                "{msg} {bytes}/{total_bytes} [{bar:30}] {bytes_per_sec}",
            )
            .expect("valid progress template"),
        ),
        None => ProgressBar::new_spinner(),
    });
    bar.set_message(
        dest.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );

    let mut file = tokio::fs::File::create(dest).await?;
    let mut resp = resp;
    let mut written: u64 = 0;
    loop {
        let chunk = match resp.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                bar.abandon();
                return Err(CoreError::Api(vifir_api::Error::Transport(e)));
            }
        };
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        bar.inc(chunk.len() as u64);
    }
    file.flush().await?;
    file.sync_all().await?;
    bar.finish();
    Ok(written)
}

/// Destination filename: the final path segment of the URL, with a
/// host-derived fallback for URLs that end in a bare slash.
fn file_name_from_url(url: &str, host: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_owned))
        })
        .filter(|segment| !segment.is_empty())
        .unwrap_or_else(|| format!("bundle-{host}.bin"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_url_path_tail() {
        assert_eq!(
            file_name_from_url("https://dl.example/bundles/esx01.tgz?ticket=abc", "host-1"),
            "esx01.tgz"
        );
    }

    #[test]
    fn file_name_falls_back_to_host_for_bare_paths() {
        assert_eq!(
            file_name_from_url("https://dl.example/", "host-3"),
            "bundle-host-3.bin"
        );
        assert_eq!(file_name_from_url("not a url", "host-3"), "bundle-host-3.bin");
    }
}
