//! WebSocket bridge: decodes push frames from the backend and republishes them on the
//! in-process push channel.

use crate::config::ClientConfig;
use ::http::header::{HeaderValue, AUTHORIZATION, USER_AGENT};
use futures::StreamExt;
use std::time::Duration;
use svcdeck_core::{wire, PushChannel};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message},
};
use tracing::{debug, info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Decode one text frame and publish it. Returns how many subscribers received the batch.
pub fn route_message(text: &str, channel: &PushChannel) -> anyhow::Result<usize> {
    let (topic, records) = wire::decode_envelope(text)?;
    debug!(%topic, records = records.len(), "push frame");
    Ok(channel.publish(&topic, records))
}

/// Keep a push connection open for the lifetime of the returned task, reconnecting with
/// exponential backoff. Abort the handle to stop.
pub fn spawn_push_bridge(config: ClientConfig, channel: PushChannel) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match run_once(&config, &channel).await {
                Ok(()) => {
                    info!("push stream closed by server");
                    backoff = INITIAL_BACKOFF;
                }
                Err(e) => warn!(error = %e, retry_in = ?backoff, "push stream failed"),
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    })
}

async fn run_once(config: &ClientConfig, channel: &PushChannel) -> anyhow::Result<()> {
    let mut request = config.events_url().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert(USER_AGENT, HeaderValue::from_static("svcdeck-cli"));
    if let Some(tok) = &config.token {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", tok))?);
    }

    let (ws_stream, _resp) = connect_async(request).await?;
    info!(url = %config.events_url(), "push stream connected");
    let (_write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        match msg? {
            Message::Text(text) => {
                if let Err(e) = route_message(&text, channel) {
                    warn!(error = %e, "dropping malformed push frame");
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}
