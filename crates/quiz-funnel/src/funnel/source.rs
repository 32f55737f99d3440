use super::domain::{Condition, OutcomeRecord, Question};
use crate::config::SourceConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },
    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },
    #[error("invalid {resource} payload: {source}")]
    Decode {
        resource: &'static str,
        source: serde_json::Error,
    },
}

/// The three datasets the funnel consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Quiz,
    Conditions,
    Blogs,
}

impl Resource {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Quiz => "quiz",
            Self::Conditions => "conditions",
            Self::Blogs => "blogs",
        }
    }
}

/// Loads funnel data either from local fixture files or from the backend API.
#[derive(Debug, Clone)]
pub enum FunnelSource {
    Fixture { dir: PathBuf },
    Backend { base_url: String, client: reqwest::Client },
}

impl FunnelSource {
    pub fn from_config(config: &SourceConfig) -> Result<Self, DataLoadError> {
        match config {
            SourceConfig::Fixture { dir } => Ok(Self::Fixture { dir: dir.clone() }),
            SourceConfig::Backend { base_url, timeout } => Self::backend(base_url, *timeout),
        }
    }

    pub fn backend(base_url: &str, timeout: Duration) -> Result<Self, DataLoadError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| DataLoadError::Http {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self::Backend { base_url, client })
    }

    pub async fn load_quiz(&self) -> Result<Vec<Question>, DataLoadError> {
        self.fetch(Resource::Quiz).await
    }

    pub async fn load_blogs(&self) -> Result<Vec<OutcomeRecord>, DataLoadError> {
        self.fetch(Resource::Blogs).await
    }

    /// Entries without a string `text` or a non-blank `redirect` are dropped rather than failing
    /// the whole list.
    pub async fn load_conditions(&self) -> Result<Vec<Condition>, DataLoadError> {
        let raw: Vec<RawCondition> = self.fetch(Resource::Conditions).await?;
        Ok(raw.into_iter().filter_map(RawCondition::into_condition).collect())
    }

    pub async fn load_conditions_or_empty(&self) -> Vec<Condition> {
        match self.load_conditions().await {
            Ok(conditions) => conditions,
            Err(err) => {
                warn!(error = %err, "conditions unavailable, no outcome will match");
                Vec::new()
            }
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, resource: Resource) -> Result<T, DataLoadError> {
        let bytes = match self {
            Self::Fixture { dir } => {
                let path = dir.join(format!("{}.json", resource.name()));
                debug!(path = %path.display(), "reading fixture");
                tokio::fs::read(&path)
                    .await
                    .map_err(|source| DataLoadError::Io { path, source })?
            }
            Self::Backend { base_url, client } => {
                let url = format!("{base_url}/api/{}", resource.name());
                debug!(%url, "fetching from backend");
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|source| DataLoadError::Http {
                        url: url.clone(),
                        source,
                    })?;
                let status = response.status();
                if !status.is_success() {
                    return Err(DataLoadError::Status {
                        url,
                        status: status.as_u16(),
                    });
                }
                response
                    .bytes()
                    .await
                    .map_err(|source| DataLoadError::Http { url, source })?
                    .to_vec()
            }
        };

        serde_json::from_slice(&bytes).map_err(|source| DataLoadError::Decode {
            resource: resource.name(),
            source,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    #[serde(default)]
    redirect: Option<String>,
    #[serde(default)]
    text: Option<serde_json::Value>,
}

impl RawCondition {
    fn into_condition(self) -> Option<Condition> {
        let text = match self.text? {
            serde_json::Value::String(text) if !text.is_empty() => text,
            _ => return None,
        };
        let redirect = self.redirect.filter(|redirect| !redirect.trim().is_empty())?;
        Some(Condition { redirect, text })
    }
}
