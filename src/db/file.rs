use std::path::PathBuf;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::warn;

use crate::db::{JobTransition, Repository, apply_transition};
use crate::models::{Asset, Job, JobStatus};
use crate::storage::{LocalFileStorage, ObjectStore};

const JOB_DIR: &str = "jobs";
const ASSET_DIR: &str = "assets";

/// One pretty-printed JSON document per row, under `jobs/` and `assets/`.
#[derive(Debug)]
pub struct FileRepository {
    storage: LocalFileStorage,
    write_lock: Mutex<()>,
}

impl FileRepository {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            storage: LocalFileStorage::new(base_dir),
            write_lock: Mutex::new(()),
        }
    }

    fn row_key(table: &str, id: &str) -> Result<String> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            bail!("invalid row id: {id:?}");
        }
        Ok(format!("{table}/{id}.json"))
    }

    async fn read_row<T: DeserializeOwned>(&self, table: &str, id: &str) -> Result<Option<T>> {
        let Ok(key) = Self::row_key(table, id) else {
            return Ok(None);
        };
        match self.storage.read(&key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write_row<T: Serialize>(&self, table: &str, id: &str, row: &T) -> Result<()> {
        let key = Self::row_key(table, id)?;
        let payload = serde_json::to_vec_pretty(row)?;
        self.storage.write(&key, &payload).await
    }

    async fn read_table<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let dir_path = self.storage.resolve_path(table);
        let mut paths: Vec<PathBuf> = Vec::new();
        let mut dir = match fs::read_dir(&dir_path).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                paths.push(path);
            }
        }

        let mut rows = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = fs::read(&path).await?;
            match serde_json::from_slice::<T>(&bytes) {
                Ok(row) => rows.push(row),
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable row"),
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn insert_job(&self, job: &Job) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.read_row::<Job>(JOB_DIR, &job.id).await?.is_some() {
            bail!("job {} already exists", job.id);
        }
        self.write_row(JOB_DIR, &job.id, job).await
    }

    async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        self.read_row(JOB_DIR, id).await
    }

    async fn transition_job(&self, id: &str, transition: JobTransition) -> Result<Job> {
        let _guard = self.write_lock.lock().await;
        let mut job: Job = self
            .read_row(JOB_DIR, id)
            .await?
            .ok_or_else(|| anyhow!("job {id} not found"))?;
        apply_transition(&mut job, transition)?;
        self.write_row(JOB_DIR, id, &job).await?;
        Ok(job)
    }

    async fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .read_table::<Job>(JOB_DIR)
            .await?
            .into_iter()
            .filter(|job| status.is_none_or(|wanted| job.status == wanted))
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn insert_asset(&self, asset: &Asset) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.read_row::<Asset>(ASSET_DIR, &asset.id).await?.is_some() {
            bail!("asset {} already exists", asset.id);
        }
        self.write_row(ASSET_DIR, &asset.id, asset).await
    }

    async fn get_asset(&self, id: &str) -> Result<Option<Asset>> {
        self.read_row(ASSET_DIR, id).await
    }

    async fn update_asset(&self, asset: &Asset) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if self.read_row::<Asset>(ASSET_DIR, &asset.id).await?.is_none() {
            bail!("asset {} not found", asset.id);
        }
        self.write_row(ASSET_DIR, &asset.id, asset).await
    }

    async fn delete_asset(&self, id: &str) -> Result<()> {
        let Ok(key) = Self::row_key(ASSET_DIR, id) else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        self.storage.delete(&key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssetKind, GenerationOptions, JobMode};

    fn job(style: &str) -> Job {
        Job::queued(
            "dev@example.com".into(),
            None,
            JobMode::TextToImage,
            style.into(),
            style.into(),
            "blurry".into(),
            "@cf/black-forest-labs/flux-1-schnell".into(),
            GenerationOptions::default(),
        )
    }

    #[tokio::test]
    async fn jobs_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path().to_path_buf());
        let job = job("a red chair");
        repo.insert_job(&job).await.unwrap();
        assert!(repo.insert_job(&job).await.is_err());

        repo.transition_job(&job.id, JobTransition::Processing)
            .await
            .unwrap();

        let reopened = FileRepository::new(dir.path().to_path_buf());
        let stored = reopened.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Processing);
        assert_eq!(stored.prompt, "a red chair");
    }

    #[tokio::test]
    async fn list_filters_by_status_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path().to_path_buf());
        let mut older = job("older");
        older.created_at = older.created_at - chrono::Duration::seconds(30);
        let newer = job("newer");
        repo.insert_job(&older).await.unwrap();
        repo.insert_job(&newer).await.unwrap();
        repo.transition_job(
            &older.id,
            JobTransition::Failed {
                error: "boom".into(),
            },
        )
        .await
        .unwrap();

        let all = repo.list_jobs(None).await.unwrap();
        assert_eq!(
            all.iter().map(|job| job.style.as_str()).collect::<Vec<_>>(),
            vec!["newer", "older"]
        );
        let failed = repo.list_jobs(Some(JobStatus::Failed)).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, older.id);
    }

    #[tokio::test]
    async fn assets_update_in_place_and_odd_ids_miss() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path().to_path_buf());
        let mut asset = Asset::pending(
            "dev@example.com".into(),
            AssetKind::Original,
            "room.png".into(),
            "image/png".into(),
        );
        repo.insert_asset(&asset).await.unwrap();
        asset.storage_key = Some(asset.reserved_key());
        repo.update_asset(&asset).await.unwrap();

        let stored = repo.get_asset(&asset.id).await.unwrap().unwrap();
        assert_eq!(stored.storage_key, asset.storage_key);
        assert!(repo.get_asset("../jobs/x").await.unwrap().is_none());

        repo.delete_asset(&asset.id).await.unwrap();
        assert!(repo.get_asset(&asset.id).await.unwrap().is_none());
        repo.delete_asset(&asset.id).await.unwrap();
    }
}
