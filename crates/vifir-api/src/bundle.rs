// Support-bundle endpoints
//
// Asynchronous server-side generation jobs and the descriptors the
// download pipeline consumes once a job succeeds.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ApiClient;
use crate::error::Error;
use crate::model::EntityRef;

/// Terminal and non-terminal states of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleJobState {
    Running,
    Succeeded,
    Failed,
}

/// One generated bundle file: where to download it from and which host
/// it was generated for. Immutable once produced by the job.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleDescriptor {
    pub url: String,
    pub host: String,
}

/// Snapshot of a generation job.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleJobStatus {
    pub state: BundleJobState,
    /// Best-effort completion percentage. Some server versions report
    /// 0 for the job's whole lifetime; 0 does not mean "not started".
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub bundles: Vec<BundleDescriptor>,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    hosts: Option<Vec<&'a str>>,
}

#[derive(Deserialize)]
struct JobCreated {
    job: String,
}

impl ApiClient {
    /// Submit a bundle-generation job.
    ///
    /// `POST /api/support-bundles`. Pass the host list only when
    /// talking to a management controller; a single managed node
    /// generates for itself and rejects an explicit list.
    pub async fn submit_bundle_job(
        &self,
        hosts: Option<&[EntityRef]>,
    ) -> Result<String, Error> {
        let url = self.api_url("support-bundles");
        let req = SubmitRequest {
            hosts: hosts.map(|list| list.iter().map(|h| h.id.as_str()).collect()),
        };
        debug!(
            hosts = req.hosts.as_ref().map_or(0, Vec::len),
            "submitting bundle generation job"
        );
        let created: JobCreated = self.post(url, &req).await?;
        Ok(created.job)
    }

    /// Poll a generation job.
    ///
    /// `GET /api/support-bundles/{job}`
    pub async fn bundle_job_status(&self, job: &str) -> Result<BundleJobStatus, Error> {
        let url = self.api_url(&format!("support-bundles/{job}"));
        self.get(url).await
    }
}
