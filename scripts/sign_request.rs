// Sign a request body the way Slack does, for poking a local server with curl
// Run: cargo run --bin sign_request -- <body-file> [path]

use ragbot::signature::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn main() {
    dotenvy::dotenv().ok();

    let mut args = std::env::args().skip(1);
    let Some(body_path) = args.next() else {
        eprintln!("usage: sign_request <body-file> [path]");
        std::process::exit(2);
    };
    let path = args.next().unwrap_or_else(|| "/slack/events".to_string());

    let secret = match std::env::var("SLACK_SIGNING_SECRET") {
        Ok(secret) if !secret.is_empty() => secret,
        _ => {
            eprintln!("SLACK_SIGNING_SECRET must be set");
            std::process::exit(1);
        }
    };
    let body = match std::fs::read(&body_path) {
        Ok(body) => body,
        Err(e) => {
            eprintln!("Failed to read {}: {}", body_path, e);
            std::process::exit(1);
        }
    };
    let port = std::env::var("PORT").unwrap_or_else(|_| "8083".to_string());

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let verifier = match SignatureVerifier::new(&secret, Duration::from_secs(300)) {
        Ok(verifier) => verifier,
        Err(e) => {
            eprintln!("Invalid SLACK_SIGNING_SECRET: {}", e);
            std::process::exit(1);
        }
    };
    let signature = verifier.sign(timestamp, &body);

    let content_type = if path.ends_with("/commands") {
        "application/x-www-form-urlencoded"
    } else {
        "application/json"
    };

    println!("{}: {}", TIMESTAMP_HEADER, timestamp);
    println!("{}: {}", SIGNATURE_HEADER, signature);
    println!();
    println!(
        "curl -i -X POST 'http://localhost:{}{}' -H 'Content-Type: {}' -H '{}: {}' -H '{}: {}' --data-binary @{}",
        port, path, content_type, TIMESTAMP_HEADER, timestamp, SIGNATURE_HEADER, signature, body_path
    );
}
