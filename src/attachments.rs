use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use std::path::Path;
use tracing::{info, warn};

use crate::agent::Attachment;
use crate::slack::SlackWebClient;
use crate::types::SlackFile;

const MIME_TYPES: &[(&str, &str)] = &[
    ("js", "application/javascript"),
    ("pdf", "application/pdf"),
    ("txt", "text/plain"),
    ("csv", "text/csv"),
    ("json", "application/json"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
];

pub fn mime_type_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    extension
        .and_then(|ext| {
            MIME_TYPES
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, mime)| *mime)
        })
        .unwrap_or("application/octet-stream")
}

/// Downloads the first shared file and encodes it for the agent.
///
/// Only one file is forwarded. Download failures are logged and yield no
/// attachment rather than failing the message.
pub async fn collect(slack: &SlackWebClient, files: &[SlackFile]) -> Vec<Attachment> {
    let Some(file) = files.first() else {
        return Vec::new();
    };
    let Some(url) = file.url_private.as_deref().filter(|u| !u.is_empty()) else {
        return Vec::new();
    };

    let name = file.name.clone().unwrap_or_else(|| "attachment".to_string());
    match slack.download_file(url).await {
        Ok(bytes) => {
            info!(file = %name, size = bytes.len(), "downloaded attachment");
            vec![encode(name, file.mimetype.as_deref(), &bytes)]
        }
        Err(e) => {
            warn!(file = %name, error = %e, "failed to download attachment");
            Vec::new()
        }
    }
}

fn encode(name: String, mimetype: Option<&str>, bytes: &[u8]) -> Attachment {
    let media_type = mimetype
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| mime_type_for(&name))
        .to_string();
    Attachment {
        data: BASE64_STANDARD.encode(bytes),
        name,
        media_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_type_by_extension() {
        assert_eq!(mime_type_for("report.PDF"), "application/pdf");
        assert_eq!(mime_type_for("photo.jpeg"), "image/jpeg");
        assert_eq!(mime_type_for("archive.tar.gz"), "application/octet-stream");
        assert_eq!(mime_type_for("README"), "application/octet-stream");
    }

    #[test]
    fn encode_prefers_platform_mimetype() {
        let a = encode("notes.txt".into(), Some("text/markdown"), b"# hi");
        assert_eq!(a.media_type, "text/markdown");
        assert_eq!(a.data, "IyBoaQ==");

        let a = encode("notes.csv".into(), Some(""), b"a,b");
        assert_eq!(a.media_type, "text/csv");
    }

    #[tokio::test]
    async fn files_without_private_url_are_skipped() {
        let slack = SlackWebClient::with_api_base("xoxb".into(), "http://127.0.0.1:9");
        let files = vec![SlackFile {
            name: Some("a.txt".into()),
            ..SlackFile::default()
        }];
        assert!(collect(&slack, &files).await.is_empty());
        assert!(collect(&slack, &[]).await.is_empty());
    }

    #[tokio::test]
    async fn failed_download_yields_no_attachment() {
        let slack = SlackWebClient::with_api_base("xoxb".into(), "http://127.0.0.1:9");
        let files = vec![SlackFile {
            name: Some("a.txt".into()),
            url_private: Some("http://127.0.0.1:9/files/a.txt".into()),
            ..SlackFile::default()
        }];
        assert!(collect(&slack, &files).await.is_empty());
    }
}
