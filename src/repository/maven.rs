//! Maven-layout repository client.
//!
//! Talks to an Artifactory-style repository over HTTP: version sets come
//! from `maven-metadata.xml`, file listings from the storage list API, and
//! direct dependencies from the version's POM. Transient failures are
//! retried with exponential backoff and surface as
//! `AppError::RepositoryUnavailable`.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::coordinate::ProjectVersionCoordinate;
use crate::repository::{ArtifactRepository, ArtifactType, FileHandle};

/// Retry configuration for exponential backoff
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay in milliseconds before first retry
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each retry)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
        }
    }
}

/// HTTP client against a Maven-layout artifact repository.
pub struct MavenRepositoryClient {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

/// Response of the storage list API.
#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<FileListEntry>,
}

#[derive(Debug, Deserialize)]
struct FileListEntry {
    uri: String,
    #[serde(default)]
    size: i64,
    sha2: Option<String>,
}

impl MavenRepositoryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, retry: RetryConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            retry,
        })
    }

    fn project_url(&self, group_id: &str, artifact_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            group_id.replace('.', "/"),
            artifact_id
        )
    }

    /// GET with retry on transport errors and 5xx responses.
    ///
    /// Returns the final response for any non-5xx status; retry exhaustion
    /// maps to `RepositoryUnavailable`.
    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            match self.client.get(url).send().await {
                Ok(resp) if !resp.status().is_server_error() => return Ok(resp),
                Ok(resp) => {
                    if attempt >= self.retry.max_retries {
                        return Err(AppError::RepositoryUnavailable(format!(
                            "GET {url} returned {} after {attempt} retries",
                            resp.status()
                        )));
                    }
                    tracing::warn!(url, status = %resp.status(), attempt, "Repository returned server error, retrying");
                }
                Err(e) => {
                    if attempt >= self.retry.max_retries {
                        return Err(AppError::RepositoryUnavailable(format!(
                            "GET {url} failed after {attempt} retries: {e}"
                        )));
                    }
                    tracing::warn!(url, attempt, "Repository request failed, retrying: {e}");
                }
            }
            tokio::time::sleep(backoff_delay(&self.retry, attempt)).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl ArtifactRepository for MavenRepositoryClient {
    async fn find_files(
        &self,
        artifact_type: ArtifactType,
        group_id: &str,
        artifact_id: &str,
        version_id: &str,
    ) -> Result<Vec<FileHandle>> {
        let url = format!(
            "{}/api/storage/{}/{}/{}?list&deep=1",
            self.base_url.trim_end_matches('/'),
            group_id.replace('.', "/"),
            artifact_id,
            version_id
        );
        let resp = self.get_with_retry(&url).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(AppError::RepositoryUnavailable(format!(
                "file listing for {group_id}:{artifact_id}:{version_id} returned {}",
                resp.status()
            )));
        }
        let listing: FileListResponse = resp
            .json()
            .await
            .map_err(|e| AppError::RepositoryUnavailable(format!("invalid file listing: {e}")))?;

        let prefix = format!("/{}/", artifact_type.as_str());
        Ok(listing
            .files
            .into_iter()
            .filter(|f| f.uri.starts_with(&prefix))
            .map(|f| FileHandle {
                path: f.uri.trim_start_matches('/').to_string(),
                checksum_sha256: f.sha2.unwrap_or_default(),
                size_bytes: f.size,
            })
            .collect())
    }

    async fn find_versions(&self, group_id: &str, artifact_id: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/maven-metadata.xml",
            self.project_url(group_id, artifact_id)
        );
        let resp = self.get_with_retry(&url).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(AppError::RepositoryUnavailable(format!(
                "version listing for {group_id}:{artifact_id} returned {}",
                resp.status()
            )));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| AppError::RepositoryUnavailable(format!("invalid metadata body: {e}")))?;
        Ok(parse_maven_versions(&body))
    }

    async fn find_dependencies(
        &self,
        group_id: &str,
        artifact_id: &str,
        version_id: &str,
    ) -> Result<Vec<ProjectVersionCoordinate>> {
        let url = format!(
            "{}/{}/{}-{}.pom",
            self.project_url(group_id, artifact_id),
            version_id,
            artifact_id,
            version_id
        );
        let resp = self.get_with_retry(&url).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(AppError::RepositoryUnavailable(format!(
                "descriptor for {group_id}:{artifact_id}:{version_id} returned {}",
                resp.status()
            )));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| AppError::RepositoryUnavailable(format!("invalid descriptor body: {e}")))?;
        Ok(parse_pom_dependencies(&body))
    }
}

/// Compute the backoff delay before retry number `attempt` (zero-based).
pub(crate) fn backoff_delay(cfg: &RetryConfig, attempt: u32) -> Duration {
    let factor = cfg.backoff_multiplier.powi(attempt as i32);
    let delay_ms = (cfg.initial_delay_ms as f64 * factor) as u64;
    Duration::from_millis(delay_ms.min(cfg.max_delay_ms))
}

/// Extract the `<versions><version>` entries of a maven-metadata.xml body.
pub(crate) fn parse_maven_versions(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut versions = Vec::new();
    let mut in_versions = false;
    let mut in_version = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"versions" => in_versions = true,
                b"version" if in_versions => in_version = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"versions" => in_versions = false,
                b"version" => in_version = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_version => {
                if let Ok(text) = t.unescape() {
                    let v = text.trim().to_string();
                    if !v.is_empty() {
                        versions.push(v);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!("Malformed maven-metadata.xml, stopping parse: {e}");
                break;
            }
            _ => {}
        }
    }
    versions
}

/// Extract `<dependencies><dependency>` coordinates from a POM body.
///
/// Entries missing any of groupId/artifactId/version are dropped.
pub(crate) fn parse_pom_dependencies(xml: &str) -> Vec<ProjectVersionCoordinate> {
    let mut reader = Reader::from_str(xml);
    let mut deps = Vec::new();
    let mut in_dependency = false;
    let mut current_field: Option<&'static str> = None;
    let mut group = String::new();
    let mut artifact = String::new();
    let mut version = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"dependency" => {
                    in_dependency = true;
                    group.clear();
                    artifact.clear();
                    version.clear();
                }
                b"groupId" if in_dependency => current_field = Some("group"),
                b"artifactId" if in_dependency => current_field = Some("artifact"),
                b"version" if in_dependency => current_field = Some("version"),
                _ => current_field = None,
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"dependency" => {
                    in_dependency = false;
                    if !group.is_empty() && !artifact.is_empty() && !version.is_empty() {
                        deps.push(ProjectVersionCoordinate::new(
                            group.trim(),
                            artifact.trim(),
                            version.trim(),
                        ));
                    }
                }
                _ => current_field = None,
            },
            Ok(Event::Text(t)) => {
                if let (true, Some(field)) = (in_dependency, current_field) {
                    if let Ok(text) = t.unescape() {
                        match field {
                            "group" => group.push_str(&text),
                            "artifact" => artifact.push_str(&text),
                            "version" => version.push_str(&text),
                            _ => {}
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!("Malformed POM, stopping parse: {e}");
                break;
            }
            _ => {}
        }
    }
    deps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let cfg = RetryConfig::default();
        assert_eq!(backoff_delay(&cfg, 0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&cfg, 1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(&cfg, 2), Duration::from_millis(4000));
        // 1000 * 2^10 = 1_024_000 → capped at 30_000
        assert_eq!(backoff_delay(&cfg, 10), Duration::from_millis(30000));
    }

    #[test]
    fn parses_maven_metadata_versions() {
        let xml = r#"
            <metadata>
              <groupId>org.example</groupId>
              <artifactId>depot</artifactId>
              <versioning>
                <latest>2.0.0</latest>
                <versions>
                  <version>1.0.0</version>
                  <version>1.1.0</version>
                  <version>2.0.0</version>
                  <version>master-SNAPSHOT</version>
                </versions>
              </versioning>
            </metadata>"#;
        assert_eq!(
            parse_maven_versions(xml),
            vec!["1.0.0", "1.1.0", "2.0.0", "master-SNAPSHOT"]
        );
    }

    #[test]
    fn ignores_version_tags_outside_versions_block() {
        // <latest> and top-level <version> must not leak into the set.
        let xml = r#"
            <metadata>
              <version>9.9.9</version>
              <versioning>
                <versions>
                  <version>1.0.0</version>
                </versions>
              </versioning>
            </metadata>"#;
        assert_eq!(parse_maven_versions(xml), vec!["1.0.0"]);
    }

    #[test]
    fn empty_metadata_yields_no_versions() {
        assert!(parse_maven_versions("<metadata/>").is_empty());
        assert!(parse_maven_versions("").is_empty());
    }

    #[test]
    fn parses_pom_dependencies() {
        let xml = r#"
            <project>
              <groupId>org.example</groupId>
              <artifactId>depot</artifactId>
              <version>1.0.0</version>
              <dependencies>
                <dependency>
                  <groupId>org.example</groupId>
                  <artifactId>core</artifactId>
                  <version>1.2.0</version>
                </dependency>
                <dependency>
                  <groupId>org.other</groupId>
                  <artifactId>util</artifactId>
                  <version>master-SNAPSHOT</version>
                </dependency>
              </dependencies>
            </project>"#;
        let deps = parse_pom_dependencies(xml);
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0], ProjectVersionCoordinate::new("org.example", "core", "1.2.0"));
        assert_eq!(
            deps[1],
            ProjectVersionCoordinate::new("org.other", "util", "master-SNAPSHOT")
        );
    }

    #[test]
    fn incomplete_dependency_entries_are_dropped() {
        let xml = r#"
            <project>
              <dependencies>
                <dependency>
                  <groupId>org.example</groupId>
                  <artifactId>no-version</artifactId>
                </dependency>
              </dependencies>
            </project>"#;
        assert!(parse_pom_dependencies(xml).is_empty());
    }

    #[test]
    fn project_coordinates_do_not_leak_into_dependencies() {
        let xml = r#"
            <project>
              <groupId>org.example</groupId>
              <artifactId>depot</artifactId>
              <version>1.0.0</version>
              <dependencies/>
            </project>"#;
        assert!(parse_pom_dependencies(xml).is_empty());
    }
}
