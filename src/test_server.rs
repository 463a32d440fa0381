//! Local HTTP endpoint for exercising the outbound clients in tests.

use axum::body::Bytes;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// JSON bodies received by a [`recording`] router, in arrival order.
#[derive(Clone, Default)]
pub struct Recorded(Arc<Mutex<Vec<(String, Value)>>>);

impl Recorded {
    /// Bodies posted to `path`.
    pub fn bodies(&self, path: &str) -> Vec<Value> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }
}

/// Answers every request with `status` and `reply`, recording path and body.
pub fn recording(recorded: Recorded, status: StatusCode, reply: Value) -> Router {
    Router::new().fallback(move |uri: Uri, body: Bytes| {
        let recorded = recorded.clone();
        let reply = reply.clone();
        async move {
            let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
            recorded.0.lock().unwrap().push((uri.path().to_string(), body));
            (status, axum::Json(reply)).into_response()
        }
    })
}

/// Serves `app` on an ephemeral localhost port and returns its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
