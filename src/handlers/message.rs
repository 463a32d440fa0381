use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::agent::{with_deadline, AgentClient, AgentError};
use crate::attachments;
use crate::dispatch::{strip_wake_phrase, Route};
use crate::format;
use crate::slack::SlackWebClient;
use crate::types::{EventDetails, SlackFile};

static MENTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*<@[^>]+>").expect("Invalid mention regex"));

const TRACEBACK_FLAG: &str = "--traceback";
const ATTACHMENT_HINT: &str = " use these files when generating your answer";

#[derive(Debug, Error)]
pub enum MessageError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("{0}")]
    Unhealthy(String),
}

/// Answers conversational messages by forwarding them to the agent.
pub struct MessageHandler {
    slack: Arc<SlackWebClient>,
    agent: Arc<dyn AgentClient>,
    bot_name: String,
    agent_timeout: Duration,
}

impl MessageHandler {
    pub fn new(
        slack: Arc<SlackWebClient>,
        agent: Arc<dyn AgentClient>,
        bot_name: String,
        agent_timeout: Duration,
    ) -> Self {
        Self {
            slack,
            agent,
            bot_name,
            agent_timeout,
        }
    }

    /// Runs the handler a route points at. Routes without a handler are no-ops.
    pub async fn handle(&self, route: Route) {
        match route {
            Route::Mention(event) => self.handle_mention(event).await,
            Route::DirectMessage(event) => self.handle_direct_message(event).await,
            Route::DirectThread(event) => self.handle_direct_thread(event).await,
            Route::Thread(event) => self.handle_thread(event).await,
            Route::Ignored(_) | Route::Unhandled(_) => {}
        }
    }

    pub async fn handle_mention(&self, event: EventDetails) {
        info!(channel = %event.channel, user = %event.user, "processing app mention");
        let text = strip_mention(&event.text);
        self.process_message(&event, &text).await;
    }

    pub async fn handle_direct_message(&self, event: EventDetails) {
        info!(channel = %event.channel, user = %event.user, "processing direct message");
        self.process_message(&event, &event.text).await;
    }

    pub async fn handle_direct_thread(&self, event: EventDetails) {
        info!(channel = %event.channel, user = %event.user, "processing direct thread message");
        self.process_message(&event, &event.text).await;
    }

    pub async fn handle_thread(&self, event: EventDetails) {
        let Some(text) = strip_wake_phrase(&event.text, &self.bot_name) else {
            return;
        };
        info!(channel = %event.channel, user = %event.user, "processing thread message");
        self.process_message(&event, text).await;
    }

    async fn process_message(&self, event: &EventDetails, text: &str) {
        let thread = event.reply_thread();
        self.react(event, "thinking_face").await;

        match self.answer(text, thread, &event.files).await {
            Ok(reply) => {
                self.react(event, "white_check_mark").await;
                self.post(event, &reply).await;
            }
            Err(e) => {
                error!(channel = %event.channel, thread, error = %e, "error invoking agent");
                self.react(event, "x").await;
                self.post(event, &format!("Error invoking Bedrock agent: {}", e))
                    .await;
            }
        }
    }

    /// Produces the reply text for one message, without touching Slack
    /// beyond downloading attachments.
    pub async fn answer(
        &self,
        text: &str,
        session_id: &str,
        files: &[SlackFile],
    ) -> Result<String, MessageError> {
        let (want_trace, input) = split_traceback_flag(text);

        let attachments = attachments::collect(&self.slack, files).await;
        let mut input = input;
        if !attachments.is_empty() {
            input.push_str(ATTACHMENT_HINT);
        }

        let health = with_deadline(self.agent_timeout, self.agent.check_health()).await?;
        if !health.healthy {
            return Err(MessageError::Unhealthy(format::health(&health)));
        }

        let reply = with_deadline(
            self.agent_timeout,
            self.agent
                .invoke_agent(&input, session_id, &attachments, want_trace),
        )
        .await?;

        if want_trace {
            return Ok(format!(
                "{}\n\n{}",
                reply.text,
                format::traceback(reply.trace.as_ref())
            ));
        }
        Ok(reply.text)
    }

    async fn react(&self, event: &EventDetails, name: &str) {
        if let Err(e) = self
            .slack
            .reactions_add(&event.channel, &event.ts, name)
            .await
        {
            warn!(channel = %event.channel, reaction = name, error = %e, "failed to add reaction");
        }
    }

    async fn post(&self, event: &EventDetails, text: &str) {
        if let Err(e) = self
            .slack
            .chat_post_message(&event.channel, Some(event.reply_thread()), text)
            .await
        {
            error!(channel = %event.channel, error = %e, "failed to post reply");
        }
    }
}

/// Removes the `<@U…>` mention token the platform puts in front of app mentions.
/// Mentions later in the text are part of the question and stay.
pub fn strip_mention(text: &str) -> String {
    MENTION_REGEX.replace(text, "").trim().to_string()
}

/// Splits a leading `--traceback` word off the input.
pub fn split_traceback_flag(text: &str) -> (bool, String) {
    let mut words = text.split_whitespace();
    match words.next() {
        Some(TRACEBACK_FLAG) => (true, words.collect::<Vec<_>>().join(" ")),
        _ => (false, text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::RecordingAgent;
    use crate::test_server::{recording, serve, Recorded};
    use axum::http::StatusCode;
    use serde_json::json;

    async fn handler_with_slack(agent: Arc<RecordingAgent>) -> (MessageHandler, Recorded) {
        let recorded = Recorded::default();
        let base = serve(recording(recorded.clone(), StatusCode::OK, json!({"ok": true}))).await;
        let handler = MessageHandler::new(
            Arc::new(SlackWebClient::with_api_base("xoxb-test".into(), base)),
            agent,
            "ragbot".into(),
            Duration::from_secs(5),
        );
        (handler, recorded)
    }

    fn reactions(recorded: &Recorded) -> Vec<String> {
        recorded
            .bodies("/reactions.add")
            .iter()
            .map(|body| body["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    fn handler(agent: Arc<RecordingAgent>) -> MessageHandler {
        MessageHandler::new(
            Arc::new(SlackWebClient::with_api_base("xoxb-test".into(), "http://127.0.0.1:9")),
            agent,
            "ragbot".into(),
            Duration::from_secs(5),
        )
    }

    fn event(text: &str, ts: &str, thread_ts: Option<&str>) -> EventDetails {
        EventDetails {
            channel: "C1".into(),
            user: "U1".into(),
            text: text.into(),
            ts: ts.into(),
            thread_ts: thread_ts.map(String::from),
            ..EventDetails::default()
        }
    }

    #[tokio::test]
    async fn failed_invoke_reacts_with_x_and_posts_error_in_thread() {
        let agent = Arc::new(RecordingAgent {
            fail_invoke: true,
            ..RecordingAgent::default()
        });
        let (handler, recorded) = handler_with_slack(agent).await;

        handler.handle_direct_message(event("hello", "5.5", None)).await;

        assert_eq!(reactions(&recorded), ["thinking_face", "x"]);
        for body in recorded.bodies("/reactions.add") {
            assert_eq!(body["channel"], "C1");
            assert_eq!(body["timestamp"], "5.5");
        }
        let posts = recorded.bodies("/chat.postMessage");
        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0]["text"],
            "Error invoking Bedrock agent: agent API returned 500: boom"
        );
        assert_eq!(posts[0]["thread_ts"], "5.5");
        assert_eq!(posts[0]["channel"], "C1");
    }

    #[tokio::test]
    async fn answered_message_reacts_with_check_and_replies_in_parent_thread() {
        let agent = Arc::new(RecordingAgent::default());
        let (handler, recorded) = handler_with_slack(agent).await;

        handler
            .handle_direct_thread(event("what changed", "7.2", Some("7.0")))
            .await;

        assert_eq!(reactions(&recorded), ["thinking_face", "white_check_mark"]);
        assert_eq!(recorded.bodies("/reactions.add")[0]["timestamp"], "7.2");
        let posts = recorded.bodies("/chat.postMessage");
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["text"], "answer to what changed");
        assert_eq!(posts[0]["thread_ts"], "7.0");
        assert_eq!(
            recorded.paths(),
            ["/reactions.add", "/reactions.add", "/chat.postMessage"]
        );
    }

    #[test]
    fn mention_token_is_removed() {
        assert_eq!(strip_mention("<@U024BE7LH> what is new?"), "what is new?");
        assert_eq!(strip_mention("no mention here"), "no mention here");
    }

    #[test]
    fn only_a_leading_mention_is_removed() {
        assert_eq!(strip_mention("ask <@U2> about X"), "ask <@U2> about X");
        assert_eq!(strip_mention("  <@U1> ask <@U2> about X"), "ask <@U2> about X");
    }

    #[test]
    fn traceback_flag_only_counts_as_first_word() {
        assert_eq!(
            split_traceback_flag("--traceback  why   is it"),
            (true, "why is it".to_string())
        );
        assert_eq!(
            split_traceback_flag("explain --traceback"),
            (false, "explain --traceback".to_string())
        );
        assert_eq!(split_traceback_flag(""), (false, String::new()));
    }

    #[tokio::test]
    async fn mention_uses_thread_as_session_and_strips_mention() {
        let agent = Arc::new(RecordingAgent::default());
        handler(agent.clone())
            .handle_mention(event("<@U0> summarise the docs", "1.2", Some("1.1")))
            .await;

        let prompts = agent.prompts.lock().unwrap();
        assert_eq!(
            *prompts,
            vec![("summarise the docs".to_string(), "1.1".to_string())]
        );
    }

    #[tokio::test]
    async fn direct_message_without_thread_uses_own_ts() {
        let agent = Arc::new(RecordingAgent::default());
        handler(agent.clone())
            .handle_direct_message(event("hello", "7.7", None))
            .await;
        assert_eq!(agent.prompts.lock().unwrap()[0].1, "7.7");
    }

    #[tokio::test]
    async fn thread_message_drops_wake_phrase() {
        let agent = Arc::new(RecordingAgent::default());
        let handler = handler(agent.clone());
        handler
            .handle_thread(event("Hey Ragbot  what changed?", "2.2", Some("2.1")))
            .await;
        handler
            .handle_thread(event("unrelated chatter", "2.3", Some("2.1")))
            .await;

        let prompts = agent.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, "what changed?");
    }

    #[tokio::test]
    async fn traceback_is_appended_when_requested() {
        let agent = Arc::new(RecordingAgent::default());
        let reply = handler(agent.clone())
            .answer("--traceback why", "1.1", &[])
            .await
            .unwrap();
        assert!(reply.starts_with("answer to why\n\n```"));
        assert!(reply.contains("🤖 Agent Traceback"));
    }

    #[tokio::test]
    async fn unhealthy_agent_is_not_invoked() {
        let agent = Arc::new(RecordingAgent::default());
        *agent.agent_status.lock().unwrap() = "CREATING".into();
        let err = handler(agent.clone())
            .answer("hi", "1.1", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, MessageError::Unhealthy(_)));
        assert!(agent.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn agent_failure_becomes_error() {
        let agent = Arc::new(RecordingAgent {
            fail_invoke: true,
            ..RecordingAgent::default()
        });
        let err = handler(agent.clone())
            .answer("hi", "1.1", &[])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "agent API returned 500: boom");
    }
}
