use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::agent::{with_deadline, AgentClient, AgentError, IngestionJob};
use crate::commands::{help_text, CommandKind};
use crate::format;
use crate::slack::SlackWebClient;
use crate::types::SlashCommand;

const JOB_STATUS_USAGE: &str = "Please provide a job ID. Usage: /ragbot-job-status <job_id>";
const SYNC_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Runs slash commands and delivers their replies out of band.
pub struct CommandHandler {
    slack: Arc<SlackWebClient>,
    agent: Arc<dyn AgentClient>,
    agent_timeout: Duration,
    sync_monitor: Duration,
}

impl CommandHandler {
    pub fn new(
        slack: Arc<SlackWebClient>,
        agent: Arc<dyn AgentClient>,
        agent_timeout: Duration,
        sync_monitor: Duration,
    ) -> Self {
        Self {
            slack,
            agent,
            agent_timeout,
            sync_monitor,
        }
    }

    pub async fn handle(&self, kind: CommandKind, cmd: SlashCommand) {
        info!(
            command = kind.name(),
            user = %cmd.user_id,
            channel = %cmd.channel_id,
            "processing command"
        );

        if kind != CommandKind::SyncDataSource {
            let text = self.reply_for(kind, &cmd).await;
            self.respond(&cmd, &text).await;
            return;
        }

        let (text, job) = self.start_sync().await;
        self.respond(&cmd, &text).await;
        if let Some(job) = job.filter(|_| !self.sync_monitor.is_zero()) {
            let text = self.follow_sync(&job.ingestion_job_id).await;
            self.respond(&cmd, &text).await;
        }
    }

    /// Builds the reply for a command. Agent failures become error replies.
    pub async fn reply_for(&self, kind: CommandKind, cmd: &SlashCommand) -> String {
        match kind {
            CommandKind::Help => help_text(),
            CommandKind::KbStatus => self
                .call(self.agent.get_knowledge_base_status())
                .await
                .map(|kb| format::knowledge_base_status(&kb))
                .unwrap_or_else(|e| failure(kind, "getting knowledge base status", &e)),
            CommandKind::SyncDataSource => self.start_sync().await.0,
            CommandKind::ListDataSources => self
                .call(self.agent.list_data_sources())
                .await
                .map(|sources| format::data_source_list(&sources))
                .unwrap_or_else(|e| failure(kind, "listing data sources", &e)),
            CommandKind::DsConfig => self
                .call(self.agent.get_data_source_config())
                .await
                .map(|ds| format::data_source_config(&ds))
                .unwrap_or_else(|e| failure(kind, "getting data source configuration", &e)),
            CommandKind::GetDataSource => self
                .call(self.agent.latest_ingestion())
                .await
                .map(|job| format::latest_ingestion(job.as_ref()))
                .unwrap_or_else(|e| failure(kind, "getting data source information", &e)),
            CommandKind::AgentStatus => self
                .call(self.agent.get_agent_status())
                .await
                .map(|agent| format::agent_status(&agent))
                .unwrap_or_else(|e| failure(kind, "getting agent status", &e)),
            CommandKind::JobStatus => {
                let job_id = cmd.text.trim();
                if job_id.is_empty() {
                    return JOB_STATUS_USAGE.to_string();
                }
                self.call(self.agent.get_job_status(job_id))
                    .await
                    .map(|job| format::job_status(&job))
                    .unwrap_or_else(|e| failure(kind, "getting job status", &e))
            }
            CommandKind::HealthCheck => self
                .call(self.agent.check_health())
                .await
                .map(|report| format::health(&report))
                .unwrap_or_else(|e| failure(kind, "checking health status", &e)),
        }
    }

    async fn start_sync(&self) -> (String, Option<IngestionJob>) {
        match self.call(self.agent.start_sync()).await {
            Ok(job) => {
                info!(job_id = %job.ingestion_job_id, "data source sync started");
                (format::sync_started(&job), Some(job))
            }
            Err(e) => (
                failure(CommandKind::SyncDataSource, "syncing data source", &e),
                None,
            ),
        }
    }

    async fn follow_sync(&self, job_id: &str) -> String {
        let poll_every = SYNC_POLL_INTERVAL.min(self.sync_monitor);
        // polling is bounded by the window; the three status lookups around it get one agent timeout each
        let deadline = self.sync_monitor + self.agent_timeout * 3;
        let monitor = self
            .agent
            .monitor_ingestion_job(job_id, self.sync_monitor, poll_every);
        match with_deadline(deadline, monitor).await {
            Ok(outcome) => format::monitor_outcome(&outcome),
            Err(e) => failure(
                CommandKind::SyncDataSource,
                "monitoring ingestion job",
                &e,
            ),
        }
    }

    async fn call<T, F>(&self, call: F) -> Result<T, AgentError>
    where
        F: Future<Output = Result<T, AgentError>>,
    {
        with_deadline(self.agent_timeout, call).await
    }

    /// Replies through `response_url`, or posts to the channel when the
    /// command came without one.
    async fn respond(&self, cmd: &SlashCommand, text: &str) {
        if !cmd.response_url.is_empty() {
            if let Err(e) = self.slack.respond(&cmd.response_url, text).await {
                error!(command = %cmd.command, error = %e, "failed to send command response");
            }
            return;
        }

        warn!(command = %cmd.command, "no response_url, posting to channel");
        if let Err(e) = self
            .slack
            .chat_post_message(&cmd.channel_id, None, text)
            .await
        {
            error!(command = %cmd.command, channel = %cmd.channel_id, error = %e, "failed to post command response");
        }
    }
}

fn failure(kind: CommandKind, action: &str, e: &AgentError) -> String {
    error!(command = kind.name(), error = %e, "command failed");
    format!("Error {}: {}", action, e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::RecordingAgent;

    fn handler(agent: Arc<RecordingAgent>) -> CommandHandler {
        CommandHandler::new(
            Arc::new(SlackWebClient::with_api_base("xoxb-test".into(), "http://127.0.0.1:9")),
            agent,
            Duration::from_secs(5),
            Duration::ZERO,
        )
    }

    fn command(name: &str, text: &str) -> SlashCommand {
        SlashCommand {
            command: name.into(),
            text: text.into(),
            channel_id: "C1".into(),
            user_id: "U1".into(),
            ..SlashCommand::default()
        }
    }

    #[tokio::test]
    async fn help_does_not_call_the_agent() {
        let agent = Arc::new(RecordingAgent::default());
        let text = handler(agent.clone())
            .reply_for(CommandKind::Help, &command("/ragbot-help", ""))
            .await;
        assert!(text.starts_with("Available commands:"));
        assert_eq!(agent.call_count(), 0);
    }

    #[tokio::test]
    async fn job_status_without_id_prints_usage() {
        let agent = Arc::new(RecordingAgent::default());
        let text = handler(agent.clone())
            .reply_for(CommandKind::JobStatus, &command("/ragbot-job-status", "   "))
            .await;
        assert_eq!(text, JOB_STATUS_USAGE);
        assert_eq!(agent.call_count(), 0);
    }

    #[tokio::test]
    async fn job_status_reports_job() {
        let agent = Arc::new(RecordingAgent::default());
        let text = handler(agent.clone())
            .reply_for(CommandKind::JobStatus, &command("/ragbot-job-status", " JOB9 "))
            .await;
        assert!(text.starts_with("INGESTION JOB STATUS:\n\nIngestion Job: JOB9\nStatus: COMPLETE"));
    }

    #[tokio::test]
    async fn agent_errors_become_replies() {
        let agent = Arc::new(RecordingAgent::default());
        let text = handler(agent.clone())
            .reply_for(CommandKind::DsConfig, &command("/ragbot-ds-config", ""))
            .await;
        assert_eq!(
            text,
            "Error getting data source configuration: Data source ID is not configured"
        );
    }

    #[tokio::test]
    async fn get_datasource_without_jobs() {
        let agent = Arc::new(RecordingAgent::default());
        let text = handler(agent)
            .reply_for(CommandKind::GetDataSource, &command("/ragbot-get-datasource", ""))
            .await;
        assert_eq!(
            text,
            "DATA SOURCE INFORMATION:\n\nNo data sources found for this knowledge base."
        );
    }

    #[tokio::test]
    async fn sync_reports_started_job() {
        let agent = Arc::new(RecordingAgent::default());
        let text = handler(agent)
            .reply_for(CommandKind::SyncDataSource, &command("/ragbot-sync-datasource", ""))
            .await;
        assert!(text.starts_with("DATA SOURCE SYNC INITIATED:"));
        assert!(text.contains("Job ID: JOB1"));
    }

    #[tokio::test]
    async fn sync_is_followed_when_monitoring_enabled() {
        let agent = Arc::new(RecordingAgent::default());
        let handler = CommandHandler::new(
            Arc::new(SlackWebClient::with_api_base("xoxb-test".into(), "http://127.0.0.1:9")),
            agent.clone(),
            Duration::from_secs(5),
            Duration::from_secs(60),
        );
        handler
            .handle(CommandKind::SyncDataSource, command("/ragbot-sync-datasource", ""))
            .await;
        // start_sync, kb before, job status, kb after, agent status
        assert_eq!(agent.call_count(), 5);
    }

    #[tokio::test]
    async fn hung_sync_monitor_ends_in_a_timeout_reply() {
        let agent = Arc::new(RecordingAgent {
            stall_job_status: true,
            ..RecordingAgent::default()
        });
        let handler = CommandHandler::new(
            Arc::new(SlackWebClient::with_api_base("xoxb-test".into(), "http://127.0.0.1:9")),
            agent.clone(),
            Duration::from_millis(20),
            Duration::from_millis(20),
        );
        let text = tokio::time::timeout(Duration::from_secs(5), handler.follow_sync("JOB1"))
            .await
            .expect("follow_sync must not hang");
        assert!(
            text.starts_with("Error monitoring ingestion job:"),
            "{}",
            text
        );
    }

    #[tokio::test]
    async fn health_check_reports_healthy_agent() {
        let agent = Arc::new(RecordingAgent::default());
        let text = handler(agent)
            .reply_for(CommandKind::HealthCheck, &command("/ragbot-health-check", ""))
            .await;
        assert!(text.starts_with("✅ Ragbot is healthy and ready to use."));
        assert!(text.contains("Agent: ragbot-agent"));
    }
}
