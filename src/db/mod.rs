pub mod file;
pub mod memory;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{Asset, Job, JobStatus};

pub use file::FileRepository;
pub use memory::MemoryRepository;

/// A status change written by the pipeline onto a job row.
#[derive(Debug, Clone, PartialEq)]
pub enum JobTransition {
    Processing,
    Succeeded {
        output_key: String,
        output_asset_id: String,
    },
    Failed {
        error: String,
    },
}

impl JobTransition {
    pub fn target(&self) -> JobStatus {
        match self {
            Self::Processing => JobStatus::Processing,
            Self::Succeeded { .. } => JobStatus::Succeeded,
            Self::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// Applies `transition`, refusing moves out of a terminal state and
/// re-entering `processing`.
pub fn apply_transition(job: &mut Job, transition: JobTransition) -> Result<()> {
    if job.status.is_terminal() {
        bail!(
            "job {} is already {:?}, cannot move to {:?}",
            job.id,
            job.status,
            transition.target()
        );
    }
    if transition == JobTransition::Processing && job.status != JobStatus::Queued {
        bail!("job {} is {:?}, cannot start processing", job.id, job.status);
    }
    job.status = transition.target();
    match transition {
        JobTransition::Processing => {}
        JobTransition::Succeeded {
            output_key,
            output_asset_id,
        } => {
            job.output_key = Some(output_key);
            job.output_asset_id = Some(output_asset_id);
            job.error = None;
        }
        JobTransition::Failed { error } => {
            job.error = Some(error);
        }
    }
    job.updated_at = Utc::now();
    Ok(())
}

/// Point lookups and updates over the `jobs` and `assets` tables.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn insert_job(&self, job: &Job) -> Result<()>;
    async fn get_job(&self, id: &str) -> Result<Option<Job>>;
    async fn transition_job(&self, id: &str, transition: JobTransition) -> Result<Job>;
    /// Newest first, optionally restricted to one status.
    async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>>;

    async fn insert_asset(&self, asset: &Asset) -> Result<()>;
    async fn get_asset(&self, id: &str) -> Result<Option<Asset>>;
    async fn update_asset(&self, asset: &Asset) -> Result<()>;
    /// Removing an unknown id is not an error.
    async fn delete_asset(&self, id: &str) -> Result<()>;
}
