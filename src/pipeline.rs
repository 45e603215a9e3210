use std::sync::Arc;

use tracing::{Instrument, error, info, warn};

use crate::ai::{Dispatcher, GenerationRequest, GenerationResult, Normalizer};
use crate::db::{JobTransition, Repository};
use crate::error::{JobFailure, StagingError};
use crate::logging::LogContext;
use crate::models::{Asset, Job, JobDescription, JobMode};
use crate::storage::ObjectStore;

const MAX_ERROR_LEN: usize = 500;

pub fn output_key(job_id: &str) -> String {
    format!("outputs/{job_id}.png")
}

fn short_message(err: &StagingError) -> String {
    let message = err.to_string();
    match message.char_indices().nth(MAX_ERROR_LEN) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message,
    }
}

/// Takes a job description from submission to a terminal status.
#[derive(Clone)]
pub struct Pipeline {
    repo: Arc<dyn Repository>,
    objects: Arc<dyn ObjectStore>,
    normalizer: Normalizer,
    dispatcher: Dispatcher,
}

impl Pipeline {
    pub fn new(
        repo: Arc<dyn Repository>,
        objects: Arc<dyn ObjectStore>,
        normalizer: Normalizer,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            repo,
            objects,
            normalizer,
            dispatcher,
        }
    }

    pub fn repo(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Validates `description`, records a job and runs it to completion.
    ///
    /// Validation failures return before any job row is written; every
    /// later failure is recorded on the job and carries its id.
    pub async fn submit(
        &self,
        user_email: &str,
        description: JobDescription,
        ctx: LogContext,
    ) -> Result<Job, JobFailure> {
        let mode = description.mode();
        let asset_id = description
            .original_asset_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());
        let source = match (mode, asset_id) {
            (JobMode::ImageToImage, Some(id)) => self
                .repo
                .get_asset(id)
                .await
                .map_err(StagingError::database)?,
            _ => None,
        };
        let request = self.normalizer.normalize(
            mode,
            &description.style,
            description.options.as_ref(),
            asset_id,
            source.as_ref(),
        )?;

        let job = Job::queued(
            user_email.to_string(),
            source.as_ref().map(|asset| asset.id.clone()),
            mode,
            description.style.trim().to_string(),
            request.prompt.clone(),
            request.negative_prompt.clone(),
            request.model.clone(),
            description.options.unwrap_or_default(),
        );
        self.repo
            .insert_job(&job)
            .await
            .map_err(StagingError::database)?;

        let ctx = ctx
            .with("job_id", job.id.clone())
            .with("mode", mode.as_str())
            .with("source_asset_id", job.original_asset_id.clone())
            .with("user", user_email);
        let span = ctx.span("process_job");
        async {
            info!(model = %job.model, "job queued");
            match self.process(&job, request, source.as_ref(), &ctx).await {
                Ok(output) => self.report_success(&job.id, &output).await,
                Err(err) => Err(self.report_failure(&job.id, err).await),
            }
        }
        .instrument(span)
        .await
    }

    async fn process(
        &self,
        job: &Job,
        request: GenerationRequest,
        source: Option<&Asset>,
        ctx: &LogContext,
    ) -> Result<Asset, StagingError> {
        self.repo
            .transition_job(&job.id, JobTransition::Processing)
            .await
            .map_err(StagingError::database)?;

        let request = match source.and_then(|asset| asset.storage_key.as_deref()) {
            Some(key) => {
                let object = self
                    .objects
                    .get(key)
                    .await
                    .map_err(StagingError::storage)?
                    .ok_or_else(|| {
                        StagingError::SourceMissing(format!(
                            "Original image not found in storage: {key}"
                        ))
                    })?;
                info!(key, bytes = object.bytes.len(), "loaded source image");
                request.with_source(object.bytes)?
            }
            None => request,
        };

        let result = self.dispatcher.generate(&request, ctx).await?;
        self.persist_output(job, source, &result).await
    }

    /// Stores the generated bytes, then records the output asset. Either step
    /// failing removes the object again.
    pub async fn persist_output(
        &self,
        job: &Job,
        source: Option<&Asset>,
        result: &GenerationResult,
    ) -> Result<Asset, StagingError> {
        let key = output_key(&job.id);
        if let Err(err) = self
            .objects
            .put(&key, &result.bytes, &result.content_type)
            .await
        {
            self.remove_object(&key).await;
            return Err(StagingError::storage(err));
        }

        let owner = source
            .map(|asset| asset.user_email.clone())
            .unwrap_or_else(|| job.user_email.clone());
        let asset = Asset::output(
            owner,
            key.clone(),
            result.content_type.clone(),
            source.and_then(|asset| asset.width),
            source.and_then(|asset| asset.height),
            result.bytes.len() as u64,
        );
        if let Err(err) = self.repo.insert_asset(&asset).await {
            self.remove_object(&key).await;
            return Err(StagingError::database(err));
        }
        info!(%key, asset_id = %asset.id, bytes = result.bytes.len(), "output stored");
        Ok(asset)
    }

    async fn report_success(&self, job_id: &str, output: &Asset) -> Result<Job, JobFailure> {
        let transition = JobTransition::Succeeded {
            output_key: output.storage_key.clone().unwrap_or_else(|| output_key(job_id)),
            output_asset_id: output.id.clone(),
        };
        match self.repo.transition_job(job_id, transition).await {
            Ok(job) => {
                info!("job succeeded");
                Ok(job)
            }
            Err(err) => {
                // A failed job keeps no output.
                if let Err(cleanup) = self.repo.delete_asset(&output.id).await {
                    warn!(asset_id = %output.id, error = %cleanup, "failed to remove output record");
                }
                if let Some(key) = output.storage_key.as_deref() {
                    self.remove_object(key).await;
                }
                Err(self
                    .report_failure(job_id, StagingError::database(err))
                    .await)
            }
        }
    }

    async fn remove_object(&self, key: &str) {
        if let Err(err) = self.objects.delete(key).await {
            warn!(%key, error = %err, "failed to remove orphaned output");
        }
    }

    async fn report_failure(&self, job_id: &str, err: StagingError) -> JobFailure {
        error!(code = err.code(), error = %err, "job failed");
        let transition = JobTransition::Failed {
            error: short_message(&err),
        };
        if let Err(write_err) = self.repo.transition_job(job_id, transition).await {
            error!(error = %write_err, "could not record job failure");
        }
        JobFailure::for_job(job_id, err)
    }
}
