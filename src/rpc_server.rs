//! promptshelf RPC server: JSON-RPC over stdin/stdout for the UI shell.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"bookmark.add", "params":{"contentId":"42"}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Events:   {"event":"entity.changed", "subscription":3, "data":{...}}
//!
//! Requests take effect on local state in line order; backend calls run
//! concurrently, so responses may arrive out of order. Logs go to stderr.

use std::sync::Arc;
use std::time::Instant;

use promptshelf::app::App;
use promptshelf::rpc_handler::{start_method, RpcContext};
use promptshelf::services::logging;
use promptshelf::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use promptshelf::types::settings::ClientSettings;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Simple rate limiter: max requests per one-second window.
struct RateLimiter {
    window_start: Instant,
    request_count: u32,
    max_per_second: u32,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        Self { window_start: Instant::now(), request_count: 0, max_per_second }
    }

    /// Returns true if the request is allowed, false if rate-limited.
    fn check(&mut self) -> bool {
        if self.window_start.elapsed().as_secs() >= 1 {
            self.window_start = Instant::now();
            self.request_count = 0;
        }
        self.request_count += 1;
        self.request_count <= self.max_per_second
    }
}

fn load_settings() -> ClientSettings {
    match SettingsEngine::from_env() {
        Ok(engine) => engine.get_settings().clone(),
        Err(err) => {
            eprintln!("promptshelf: {}; using default settings", err);
            ClientSettings::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let settings = load_settings();
    logging::init(&settings.logging);

    let app = Arc::new(App::connect(settings)?);
    let _trending = app.start_background();

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();
    let ctx = Arc::new(RpcContext::new(app.clone(), out_tx.clone()));

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(message) = out_rx.recv().await {
            let mut line = message.to_string();
            line.push('\n');
            if stdout.write_all(line.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
                break;
            }
        }
    });

    let _ = out_tx.send(json!({"event": "ready", "version": env!("CARGO_PKG_VERSION")}));
    tracing::info!("rpc server ready");

    let mut rate_limiter = RateLimiter::new(200);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let req: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                let _ = out_tx.send(json!({"id": null, "error": format!("parse error: {}", e)}));
                continue;
            }
        };

        let id = req.get("id").cloned().unwrap_or(Value::Null);

        if !rate_limiter.check() {
            tracing::warn!("rate limit exceeded");
            let _ = out_tx.send(json!({"id": id, "error": "rate limit exceeded"}));
            continue;
        }

        let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let params = req.get("params").cloned().unwrap_or(json!({}));

        // Local effects apply here, in line order; only the backend wait is spawned.
        let reply = start_method(&ctx, &method, &params);
        let out = out_tx.clone();
        tokio::spawn(async move {
            let response = match reply.await {
                Ok(val) => json!({"id": id, "result": val}),
                Err(err) => {
                    tracing::debug!(method = %method, error = %err, "rpc call failed");
                    json!({"id": id, "error": err})
                }
            };
            let _ = out.send(response);
        });
    }

    tracing::info!("stdin closed, shutting down");
    drop(ctx);
    drop(out_tx);
    // In-flight requests hold their own senders; the writer ends after them.
    let _ = writer.await;
    Ok(())
}
