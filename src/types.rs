use serde::Deserialize;

use crate::signature::Verified;

pub const URL_VERIFICATION: &str = "url_verification";

#[derive(Debug, Default, Deserialize)]
pub struct SlackEnvelope {
    #[serde(rename = "type", default)]
    pub envelope_type: String,
    pub challenge: Option<String>,
    pub event_id: Option<String>,
    pub event_time: Option<u64>,
    pub event: Option<SlackEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackEvent {
    #[serde(rename = "type", default)]
    pub event_type: String,
    pub text: Option<String>,
    pub channel: Option<String>,
    pub channel_type: Option<String>,
    pub user: Option<String>,
    pub ts: Option<String>,
    pub thread_ts: Option<String>,
    pub event_ts: Option<String>,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
    #[serde(default)]
    pub files: Vec<SlackFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SlackFile {
    pub id: Option<String>,
    pub name: Option<String>,
    pub mimetype: Option<String>,
    pub url_private: Option<String>,
}

/// An inbound event whose body has passed signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifiedEvent {
    Challenge { token: String },
    AppMention(EventDetails),
    Message(EventDetails),
    Unknown { event_type: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDetails {
    /// Platform event id, or `channel:ts` when the envelope carries none.
    pub id: Option<String>,
    /// Seconds since the epoch.
    pub timestamp: Option<u64>,
    pub channel: String,
    pub user: String,
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
    pub channel_type: Option<String>,
    pub bot_id: Option<String>,
    pub subtype: Option<String>,
    pub files: Vec<SlackFile>,
}

impl EventDetails {
    pub fn is_direct(&self) -> bool {
        self.channel_type.as_deref() == Some("im")
    }

    /// Thread to reply in: the parent thread if there is one, else the message itself.
    pub fn reply_thread(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}

impl VerifiedEvent {
    pub fn from_envelope(_proof: Verified, envelope: SlackEnvelope) -> Self {
        if envelope.envelope_type == URL_VERIFICATION {
            return match envelope.challenge {
                Some(token) => VerifiedEvent::Challenge { token },
                None => VerifiedEvent::Unknown {
                    event_type: URL_VERIFICATION.to_string(),
                },
            };
        }

        let Some(event) = envelope.event else {
            return VerifiedEvent::Unknown {
                event_type: envelope.envelope_type,
            };
        };

        let event_type = event.event_type.clone();
        let details = EventDetails::new(envelope.event_id, envelope.event_time, event);
        match event_type.as_str() {
            "app_mention" => VerifiedEvent::AppMention(details),
            "message" => VerifiedEvent::Message(details),
            _ => VerifiedEvent::Unknown { event_type },
        }
    }

    /// Like [`VerifiedEvent::from_envelope`], for an already parsed body. Event
    /// shapes this crate does not model come back as `Unknown`.
    pub fn from_value(proof: Verified, value: serde_json::Value) -> Self {
        let event_type = value
            .pointer("/event/type")
            .or_else(|| value.get("type"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        match serde_json::from_value::<SlackEnvelope>(value) {
            Ok(envelope) => Self::from_envelope(proof, envelope),
            Err(_) => VerifiedEvent::Unknown { event_type },
        }
    }

    pub fn details(&self) -> Option<&EventDetails> {
        match self {
            VerifiedEvent::AppMention(d) | VerifiedEvent::Message(d) => Some(d),
            _ => None,
        }
    }
}

impl EventDetails {
    fn new(event_id: Option<String>, event_time: Option<u64>, event: SlackEvent) -> Self {
        let ts = event.ts.unwrap_or_default();
        let channel = event.channel.unwrap_or_default();

        let id = event_id.filter(|id| !id.is_empty()).or_else(|| {
            (!channel.is_empty() && !ts.is_empty()).then(|| format!("{}:{}", channel, ts))
        });
        let timestamp = event_time.or_else(|| {
            event
                .event_ts
                .as_deref()
                .or(Some(ts.as_str()))
                .and_then(parse_slack_ts)
        });

        Self {
            id,
            timestamp,
            channel,
            user: event.user.unwrap_or_default(),
            text: event.text.unwrap_or_default(),
            ts,
            thread_ts: event.thread_ts.filter(|t| !t.is_empty()),
            channel_type: event.channel_type,
            bot_id: event.bot_id.filter(|b| !b.is_empty()),
            subtype: event.subtype.filter(|s| !s.is_empty()),
            files: event.files,
        }
    }
}

/// Parses `"1700000000.123456"` into whole seconds.
pub fn parse_slack_ts(ts: &str) -> Option<u64> {
    let secs = ts.split('.').next()?;
    secs.parse().ok()
}

/// Form fields of a slash-command submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SlashCommand {
    pub command: String,
    pub text: String,
    pub response_url: String,
    pub trigger_id: String,
    pub user_id: String,
    pub user_name: String,
    pub channel_id: String,
    pub channel_name: String,
    pub team_id: String,
    pub team_domain: String,
    pub enterprise_id: String,
}
