//! Common test utilities for api-pipeline integration tests

#![allow(dead_code)]

use api_pipeline::config::{ExecutionMode, RuntimeSettings};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Working directory for one test run
pub struct Workspace {
    pub temp: TempDir,
    pub settings: RuntimeSettings,
}

impl Workspace {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let settings = RuntimeSettings {
            config_dir: temp.path().join("config"),
            output_dir: temp.path().join("output"),
            log_dir: temp.path().join("logs"),
            execution_mode: ExecutionMode::Local,
            ephemeral_dir: temp.path().join("ephemeral"),
        };
        std::fs::create_dir_all(&settings.config_dir).unwrap();
        Self { temp, settings }
    }

    /// Write `config/{env}.toml`
    pub fn write_config(&self, env: &str, contents: &str) {
        std::fs::write(self.settings.config_dir.join(format!("{env}.toml")), contents).unwrap();
    }

    pub fn output_dir(&self) -> &Path {
        &self.settings.output_dir
    }

    /// Sorted file names in `dir` (empty if it does not exist)
    pub fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn read(path: &PathBuf) -> String {
        std::fs::read_to_string(path).unwrap()
    }
}

/// Serve `body` as JSON at `GET route`
pub async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Fake Cloud Storage: `bucket` exists, no object exists yet, uploads succeed
pub async fn mount_fake_gcs(server: &MockServer, bucket: &str) {
    let found = ResponseTemplate::new(200).set_body_json(json!({ "name": bucket }));
    Mock::given(method("GET"))
        .and(path(format!("/storage/v1/b/{bucket}")))
        .respond_with(found)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(format!("^/storage/v1/b/{bucket}/o/.+$")))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
    let stored = ResponseTemplate::new(200).set_body_json(json!({ "bucket": bucket }));
    Mock::given(method("POST"))
        .and(path(format!("/upload/storage/v1/b/{bucket}/o")))
        .respond_with(stored)
        .mount(server)
        .await;
}

/// Object names of every upload the fake store received
pub async fn uploaded_objects(server: &MockServer) -> Vec<String> {
    let mut names: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path().starts_with("/upload/"))
        .filter_map(|r| {
            r.url
                .query_pairs()
                .find(|(k, _)| k == "name")
                .map(|(_, v)| v.into_owned())
        })
        .collect();
    names.sort();
    names
}
