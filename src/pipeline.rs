//! Endpoint processing: fetch, format, write, upload
//!
//! A [`Pipeline`] walks the configured endpoints in order. Each endpoint is
//! fetched once, then every configured format is rendered, written to disk
//! and (unless `local_only`) uploaded. A failing format is logged and
//! skipped; a failing fetch follows [`EndpointFailurePolicy`]; a failing
//! upload ends the run.

use crate::config::{EndpointFailurePolicy, EndpointSpec, PipelineConfig, RuntimeSettings};
use crate::error::Result;
use crate::fetch::{FetchRequest, Fetcher};
use crate::format::format_named;
use crate::remote::{GcsStore, Uploader, object_path};
use crate::storage::LocalWriter;
use crate::types::{EndpointReport, RunReport, SkippedFormat, StoredFile, UploadRecord};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One configured pipeline, ready to run
pub struct Pipeline {
    config: PipelineConfig,
    output_dir: PathBuf,
    fetcher: Fetcher,
    writer: LocalWriter,
    uploader: Option<Uploader>,
}

impl Pipeline {
    /// Assemble a pipeline from already-built parts
    ///
    /// `uploader` is ignored when the configuration is `local_only`.
    pub fn new(
        config: PipelineConfig,
        settings: &RuntimeSettings,
        fetcher: Fetcher,
        uploader: Option<Uploader>,
    ) -> Self {
        Self {
            config,
            output_dir: settings.output_dir.clone(),
            fetcher,
            writer: LocalWriter::from_settings(settings),
            uploader,
        }
    }

    /// Build a pipeline talking to the real HTTP APIs and Cloud Storage
    pub fn from_config(config: PipelineConfig, settings: &RuntimeSettings) -> Result<Self> {
        let fetcher = Fetcher::new()?;
        let uploader = if config.defaults.local_only {
            None
        } else {
            let store = GcsStore::from_config(&config.storage)?;
            Some(Uploader::new(Arc::new(store)))
        };
        Ok(Self::new(config, settings, fetcher, uploader))
    }

    /// Process every endpoint in declared order
    pub async fn run(&self, env: &str) -> Result<RunReport> {
        let defaults = &self.config.defaults;
        tracing::info!(
            env,
            endpoints = self.config.endpoints.len(),
            mode = ?self.writer.mode(),
            local_only = defaults.local_only,
            "starting pipeline"
        );

        let mut report = RunReport {
            env: env.to_string(),
            endpoints: Vec::with_capacity(self.config.endpoints.len()),
        };

        for endpoint in &self.config.endpoints {
            let endpoint_report = self.process_endpoint(endpoint).await?;
            report.endpoints.push(endpoint_report);
        }

        tracing::info!(
            env,
            files = report.files_written(),
            uploaded = report.objects_uploaded(),
            failed_endpoints = report.failed_endpoints().count(),
            "Pipeline execution completed successfully"
        );
        Ok(report)
    }

    async fn process_endpoint(&self, endpoint: &EndpointSpec) -> Result<EndpointReport> {
        let defaults = &self.config.defaults;
        let mut report = EndpointReport {
            name: endpoint.name.clone(),
            ..Default::default()
        };

        tracing::info!(endpoint = %endpoint.name, url = %endpoint.url, "processing endpoint");

        let request = FetchRequest::for_endpoint(endpoint, defaults);
        let payload = match self.fetcher.fetch(&request).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(
                    endpoint = %endpoint.name,
                    url = %endpoint.url,
                    error = %e,
                    "failed to fetch endpoint"
                );
                match defaults.on_endpoint_error {
                    EndpointFailurePolicy::Abort => return Err(e.into()),
                    EndpointFailurePolicy::Continue => {
                        report.fetch_error = Some(e.to_string());
                        return Ok(report);
                    }
                }
            }
        };

        let folder = endpoint
            .local_path
            .clone()
            .unwrap_or_else(|| self.output_dir.clone());

        for format_name in &endpoint.formats {
            let stored = match self
                .format_and_save(&payload, format_name, &endpoint.name, &folder)
                .await
            {
                Ok(stored) => stored,
                Err(e) => {
                    tracing::error!(
                        endpoint = %endpoint.name,
                        format = %format_name,
                        error = %e,
                        "skipping format"
                    );
                    report.skipped_formats.push(SkippedFormat {
                        format: format_name.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if let Some(uploader) = self.active_uploader() {
                let file_name = stored.file_name();
                let object = object_path(&[
                    defaults.gcs_path_prefix.as_str(),
                    endpoint.gcs_path.as_str(),
                    file_name.as_str(),
                ]);
                let outcome = uploader
                    .upload(
                        &defaults.bucket,
                        &stored.path,
                        &object,
                        defaults.create_bucket_if_missing,
                    )
                    .await?;
                report.uploads.push(UploadRecord {
                    source: stored.path.clone(),
                    object,
                    outcome,
                });
            }

            report.files.push(stored);
        }

        Ok(report)
    }

    async fn format_and_save(
        &self,
        payload: &Value,
        format_name: &str,
        base_name: &str,
        folder: &Path,
    ) -> Result<StoredFile> {
        let artifact = format_named(payload, format_name)?;
        self.writer
            .save(
                &artifact.content,
                artifact.format.extension(),
                Some(base_name),
                folder,
            )
            .await
    }

    fn active_uploader(&self) -> Option<&Uploader> {
        if self.config.defaults.local_only {
            None
        } else {
            self.uploader.as_ref()
        }
    }
}

/// Load the configuration for `env` and run it once
///
/// A configuration failure is fatal: it is logged and returned before any
/// endpoint is touched.
pub async fn run_pipeline(env: &str, settings: &RuntimeSettings) -> Result<RunReport> {
    let config = PipelineConfig::load(env, &settings.config_dir)
        .await
        .inspect_err(|e| tracing::error!(env, error = %e, "failed to load pipeline config"))?;

    Pipeline::from_config(config, settings)?.run(env).await
}
