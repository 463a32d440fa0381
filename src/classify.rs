use serde_json::Value;

use crate::types::URL_VERIFICATION;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// What a request to the shared events endpoint actually is.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A slash-command form posted to the wrong endpoint.
    Command,
    /// Endpoint registration handshake; the token is echoed back verbatim.
    Challenge(String),
    /// A JSON event envelope that still needs signature verification.
    Event(Value),
    /// Neither a form nor valid JSON.
    Malformed(String),
}

/// Sorts a raw body into one of the [`Inbound`] shapes.
///
/// The form check runs before any JSON parsing: a form body is never valid
/// JSON and would otherwise be rejected as malformed.
pub fn classify(content_type: Option<&str>, body: &[u8]) -> Inbound {
    if is_form_content_type(content_type) || has_command_key(body) {
        return Inbound::Command;
    }

    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => return Inbound::Malformed(e.to_string()),
    };

    if value.get("type").and_then(Value::as_str) == Some(URL_VERIFICATION) {
        if let Some(challenge) = value.get("challenge").and_then(Value::as_str) {
            return Inbound::Challenge(challenge.to_string());
        }
    }

    Inbound::Event(value)
}

fn is_form_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

/// True when `command=` appears as a form key, i.e. at the start of the body
/// or right after a `&`.
fn has_command_key(body: &[u8]) -> bool {
    const KEY: &[u8] = b"command=";
    body.starts_with(KEY)
        || body
            .windows(KEY.len() + 1)
            .any(|w| w[0] == b'&' && &w[1..] == KEY)
}
