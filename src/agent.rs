use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::config::AgentSettings;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("agent API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("no answer within {0:?}")]
    Timeout(Duration),
}

/// A file passed to the agent alongside the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    /// Base64-encoded file content.
    pub data: String,
    pub media_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub text: String,
    pub trace: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub agent_name: String,
    pub agent_id: String,
    pub agent_status: String,
    pub foundation_model: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl AgentStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self.agent_status.as_str(), "PREPARED" | "READY")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseStatus {
    pub knowledge_base_id: String,
    pub name: String,
    pub status: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceSummary {
    pub data_source_id: String,
    pub name: String,
    pub status: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceConfig {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub data_source_configuration: DataSourceConfiguration,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DataSourceConfiguration {
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionJobSummary {
    pub ingestion_job_id: String,
    pub data_source_id: String,
    pub knowledge_base_id: String,
    pub description: Option<String>,
    pub status: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// An ingestion job, as returned both when a sync starts and when it is polled.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionJob {
    pub ingestion_job_id: String,
    pub data_source_id: String,
    pub knowledge_base_id: String,
    pub status: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    pub statistics: Option<IngestionStatistics>,
    #[serde(default)]
    pub failure_reasons: Vec<String>,
}

impl IngestionJob {
    pub fn is_finished(&self) -> bool {
        matches!(self.status.as_str(), "COMPLETE" | "FAILED" | "STOPPED")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IngestionStatistics {
    pub number_of_documents_scanned: u64,
    pub number_of_new_documents_indexed: u64,
    pub number_of_modified_documents_indexed: u64,
    pub number_of_documents_deleted: u64,
    pub number_of_documents_failed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthIssue {
    pub component: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthDetails {
    pub region: String,
    pub agent_id: String,
    pub agent_alias_id: String,
    pub agent_name: Option<String>,
    pub knowledge_base_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub healthy: bool,
    pub issues: Vec<HealthIssue>,
    pub details: HealthDetails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOutcome {
    pub success: bool,
    pub job_id: String,
    pub job_status: String,
    pub knowledge_base_updated: bool,
    pub agent_ready: bool,
    pub message: String,
}

/// Conversational agent and knowledge-base operations used by the handlers.
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn invoke_agent(
        &self,
        text: &str,
        session_id: &str,
        attachments: &[Attachment],
        want_trace: bool,
    ) -> Result<AgentReply, AgentError>;

    async fn get_agent_status(&self) -> Result<AgentStatus, AgentError>;

    async fn get_knowledge_base_status(&self) -> Result<KnowledgeBaseStatus, AgentError>;

    async fn list_data_sources(&self) -> Result<Vec<DataSourceSummary>, AgentError>;

    async fn get_data_source_config(&self) -> Result<DataSourceConfig, AgentError>;

    /// Most recent ingestion job of the configured data source, if any ran.
    async fn latest_ingestion(&self) -> Result<Option<IngestionJobSummary>, AgentError>;

    async fn start_sync(&self) -> Result<IngestionJob, AgentError>;

    async fn get_job_status(&self, job_id: &str) -> Result<IngestionJob, AgentError>;

    fn health_details(&self) -> HealthDetails;

    fn knowledge_base_configured(&self) -> bool;

    /// Agent must be prepared and, when one is configured, the knowledge base
    /// active. Failed lookups are reported as issues, not errors.
    async fn check_health(&self) -> Result<HealthReport, AgentError> {
        let mut issues = Vec::new();
        let mut details = self.health_details();

        match self.get_agent_status().await {
            Ok(agent) => {
                if !agent.is_ready() {
                    issues.push(HealthIssue {
                        component: "Agent".into(),
                        status: agent.agent_status.clone(),
                        message: format!(
                            "Agent is not in a ready state. Current status: {}",
                            agent.agent_status
                        ),
                    });
                }
                details.agent_name = Some(agent.agent_name);
            }
            Err(e) => issues.push(HealthIssue {
                component: "Agent".into(),
                status: "ERROR".into(),
                message: format!("Failed to check Agent status: {}", e),
            }),
        }

        if self.knowledge_base_configured() {
            match self.get_knowledge_base_status().await {
                Ok(kb) => {
                    if kb.status != "ACTIVE" {
                        issues.push(HealthIssue {
                            component: "Knowledge Base".into(),
                            status: kb.status.clone(),
                            message: format!(
                                "Knowledge Base is not active. Current status: {}",
                                kb.status
                            ),
                        });
                    }
                    details.knowledge_base_name = Some(kb.name);
                }
                Err(e) => issues.push(HealthIssue {
                    component: "Knowledge Base".into(),
                    status: "ERROR".into(),
                    message: format!("Failed to check Knowledge Base status: {}", e),
                }),
            }
        }

        Ok(HealthReport {
            healthy: issues.is_empty(),
            issues,
            details,
        })
    }

    /// Polls an ingestion job until it finishes, then checks that the
    /// knowledge base picked it up and the agent is still usable.
    async fn monitor_ingestion_job(
        &self,
        job_id: &str,
        max_wait: Duration,
        poll_every: Duration,
    ) -> Result<MonitorOutcome, AgentError> {
        let initial_kb = self.get_knowledge_base_status().await?;
        let deadline = tokio::time::Instant::now() + max_wait;

        let job = loop {
            let job = tokio::time::timeout_at(deadline, self.get_job_status(job_id))
                .await
                .map_err(|_| AgentError::Timeout(max_wait))??;
            if job.is_finished() {
                break job;
            }
            debug!(job_id, status = %job.status, "ingestion job still running");
            if tokio::time::Instant::now() + poll_every > deadline {
                return Err(AgentError::Timeout(max_wait));
            }
            tokio::time::sleep(poll_every).await;
        };

        let final_kb = self.get_knowledge_base_status().await?;
        let knowledge_base_updated = match (initial_kb.updated_at, final_kb.updated_at) {
            (Some(before), Some(after)) => after > before,
            (None, Some(_)) => true,
            _ => false,
        };
        let agent_ready = self.get_agent_status().await?.is_ready();
        let complete = job.status == "COMPLETE";

        let message = if complete && knowledge_base_updated && agent_ready {
            "Knowledge base successfully updated and agent is ready".to_string()
        } else if complete && !knowledge_base_updated {
            "Job completed but knowledge base timestamp was not updated".to_string()
        } else if complete && !agent_ready {
            "Job completed but agent is not in a ready state".to_string()
        } else {
            format!("Job status: {}", job.status)
        };

        Ok(MonitorOutcome {
            success: complete && knowledge_base_updated && agent_ready,
            job_id: job.ingestion_job_id,
            job_status: job.status,
            knowledge_base_updated,
            agent_ready,
            message,
        })
    }
}

/// Runs an agent call under a fixed deadline.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T, AgentError>
where
    F: Future<Output = Result<T, AgentError>>,
{
    tokio::time::timeout(deadline, call)
        .await
        .map_err(|_| AgentError::Timeout(deadline))?
}

/// [`AgentClient`] backed by the JSON agent gateway.
pub struct HttpAgentClient {
    base_url: String,
    api_token: Option<String>,
    settings: AgentSettings,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    completion: String,
    trace: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataSourceList {
    #[serde(default)]
    data_source_summaries: Vec<DataSourceSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestionJobList {
    #[serde(default)]
    ingestion_job_summaries: Vec<IngestionJobSummary>,
}

impl HttpAgentClient {
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        settings: AgentSettings,
        timeout: Duration,
    ) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
            settings,
            client,
        })
    }

    fn knowledge_base_id(&self) -> Result<&str, AgentError> {
        self.settings
            .knowledge_base_id
            .as_deref()
            .ok_or(AgentError::NotConfigured("Knowledge base ID"))
    }

    fn data_source_path(&self) -> Result<String, AgentError> {
        let kb = self.knowledge_base_id()?;
        let ds = self
            .settings
            .data_source_id
            .as_deref()
            .ok_or(AgentError::NotConfigured("Data source ID"))?;
        Ok(format!(
            "/knowledge-bases/{}/data-sources/{}",
            urlencoding::encode(kb),
            urlencoding::encode(ds)
        ))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AgentError> {
        let response = self.request(reqwest::Method::GET, path).send().await?;
        decode(response).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, AgentError> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AgentError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        let preview = if text.len() > 200 {
            text.chars().take(200).collect()
        } else {
            text
        };
        return Err(AgentError::Api {
            status: status.as_u16(),
            body: preview,
        });
    }
    serde_json::from_str(&text).map_err(|e| AgentError::Decode(e.to_string()))
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn invoke_agent(
        &self,
        text: &str,
        session_id: &str,
        attachments: &[Attachment],
        want_trace: bool,
    ) -> Result<AgentReply, AgentError> {
        info!(session_id, attachments = attachments.len(), "invoking agent");
        let path = format!(
            "/agents/{}/aliases/{}/sessions/{}/invoke",
            urlencoding::encode(&self.settings.agent_id),
            urlencoding::encode(&self.settings.agent_alias_id),
            urlencoding::encode(session_id)
        );
        let body = json!({
            "inputText": text,
            "enableTrace": want_trace,
            "attachments": attachments,
        });
        let response: InvokeResponse = self.post(&path, &body).await?;

        let text = if response.completion.is_empty() {
            format!(
                "Invoked agent successfully with session ID: {}, but received no response text.",
                session_id
            )
        } else {
            response.completion
        };
        Ok(AgentReply {
            text,
            trace: if want_trace { response.trace } else { None },
        })
    }

    async fn get_agent_status(&self) -> Result<AgentStatus, AgentError> {
        self.get(&format!(
            "/agents/{}",
            urlencoding::encode(&self.settings.agent_id)
        ))
        .await
    }

    async fn get_knowledge_base_status(&self) -> Result<KnowledgeBaseStatus, AgentError> {
        let kb = self.knowledge_base_id()?;
        self.get(&format!("/knowledge-bases/{}", urlencoding::encode(kb)))
            .await
    }

    async fn list_data_sources(&self) -> Result<Vec<DataSourceSummary>, AgentError> {
        let kb = self.knowledge_base_id()?;
        let list: DataSourceList = self
            .get(&format!(
                "/knowledge-bases/{}/data-sources",
                urlencoding::encode(kb)
            ))
            .await?;
        Ok(list.data_source_summaries)
    }

    async fn get_data_source_config(&self) -> Result<DataSourceConfig, AgentError> {
        let path = self.data_source_path()?;
        self.get(&path).await
    }

    async fn latest_ingestion(&self) -> Result<Option<IngestionJobSummary>, AgentError> {
        let path = format!("{}/ingestion-jobs?maxResults=1", self.data_source_path()?);
        let list: IngestionJobList = self.get(&path).await?;
        Ok(list.ingestion_job_summaries.into_iter().next())
    }

    async fn start_sync(&self) -> Result<IngestionJob, AgentError> {
        let path = format!("{}/ingestion-jobs", self.data_source_path()?);
        let now = OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();
        let body = json!({ "description": format!("Manual sync triggered on {}", now) });
        self.post(&path, &body).await
    }

    async fn get_job_status(&self, job_id: &str) -> Result<IngestionJob, AgentError> {
        let path = format!(
            "{}/ingestion-jobs/{}",
            self.data_source_path()?,
            urlencoding::encode(job_id)
        );
        self.get(&path).await
    }

    fn health_details(&self) -> HealthDetails {
        HealthDetails {
            region: self.settings.region.clone(),
            agent_id: self.settings.agent_id.clone(),
            agent_alias_id: self.settings.agent_alias_id.clone(),
            agent_name: None,
            knowledge_base_name: None,
        }
    }

    fn knowledge_base_configured(&self) -> bool {
        self.settings.knowledge_base_id.is_some()
    }
}
