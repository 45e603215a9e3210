use std::collections::HashMap;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::db::{JobTransition, Repository, apply_transition};
use crate::models::{Asset, Job, JobStatus};

#[derive(Debug, Default)]
pub struct MemoryRepository {
    jobs: RwLock<HashMap<String, Job>>,
    assets: RwLock<HashMap<String, Asset>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn assets(&self) -> Vec<Asset> {
        self.assets.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn insert_job(&self, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            bail!("job {} already exists", job.id);
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn transition_job(&self, id: &str, transition: JobTransition) -> Result<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| anyhow!("job {id} not found"))?;
        apply_transition(job, transition)?;
        Ok(job.clone())
    }

    async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| status.is_none_or(|wanted| job.status == wanted))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn insert_asset(&self, asset: &Asset) -> Result<()> {
        let mut assets = self.assets.write().await;
        if assets.contains_key(&asset.id) {
            bail!("asset {} already exists", asset.id);
        }
        assets.insert(asset.id.clone(), asset.clone());
        Ok(())
    }

    async fn get_asset(&self, id: &str) -> Result<Option<Asset>> {
        Ok(self.assets.read().await.get(id).cloned())
    }

    async fn update_asset(&self, asset: &Asset) -> Result<()> {
        let mut assets = self.assets.write().await;
        match assets.get_mut(&asset.id) {
            Some(existing) => {
                *existing = asset.clone();
                Ok(())
            }
            None => bail!("asset {} not found", asset.id),
        }
    }

    async fn delete_asset(&self, id: &str) -> Result<()> {
        self.assets.write().await.remove(id);
        Ok(())
    }
}
