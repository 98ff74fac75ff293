//! Line-oriented bridge between the glove's serial output and the pipeline.
//!
//! Each input line is either a JSON frame (`[true,false,false,false,false]`) or
//! one of the commands `status` / `history`. Every line gets exactly one JSON
//! response line, in input order. Frames are admitted to the buffer as they are
//! read; a closed sentence renders on its own task so the next frames keep
//! flowing while the generator works.

use std::collections::VecDeque;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::sequence::commands::{
    accept_data, complete_sentence, get_history, get_status, DataReply, IngestResponse,
};
use crate::AppState;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const HISTORY_LIMIT: usize = 10;

type Reply = oneshot::Receiver<Value>;

pub async fn bridge_loop<R, W>(
    state: &AppState,
    reader: R,
    mut writer: W,
    cancel_token: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut replies: VecDeque<Reply> = VecDeque::new();
    let mut input_open = true;

    while input_open || !replies.is_empty() {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                match line.context("failed to read from input")? {
                    Some(line) => replies.extend(handle_line(state, line.trim()).await),
                    None => {
                        log_info!("input closed, {} replies still pending", replies.len());
                        input_open = false;
                    }
                }
            }
            reply = next_reply(&mut replies), if !replies.is_empty() => {
                replies.pop_front();
                write_reply(&mut writer, &reply).await?;
            }
            _ = cancel_token.cancelled() => {
                log_info!("bridge loop shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Waits for the oldest outstanding reply so output keeps input order.
async fn next_reply(replies: &mut VecDeque<Reply>) -> Value {
    let Some(front) = replies.front_mut() else {
        return std::future::pending().await;
    };
    match front.await {
        Ok(reply) => reply,
        Err(_) => {
            log_warn!("sentence task ended without a reply");
            json!({
                "status": 500,
                "body": { "success": false, "message": "Sentence rendering failed" },
            })
        }
    }
}

async fn write_reply<W: AsyncWrite + Unpin>(writer: &mut W, reply: &Value) -> Result<()> {
    let mut encoded = serde_json::to_vec(reply)?;
    encoded.push(b'\n');
    writer
        .write_all(&encoded)
        .await
        .context("failed to write response")?;
    writer.flush().await?;
    Ok(())
}

fn envelope(response: IngestResponse) -> Value {
    json!({ "status": response.status, "body": response.body })
}

async fn handle_line(state: &AppState, line: &str) -> Option<Reply> {
    let (reply_tx, reply_rx) = oneshot::channel();

    let reply = match line {
        "" => return None,
        "status" => json!({ "status": 200, "body": get_status(state).await }),
        "history" => match get_history(state, HISTORY_LIMIT).await {
            Ok(records) => json!({ "status": 200, "body": records }),
            Err(err) => json!({ "status": 500, "body": { "success": false, "message": err } }),
        },
        raw => match serde_json::from_str::<Value>(raw) {
            Err(err) => {
                log_warn!("unparseable frame {raw:?}: {err}");
                json!({
                    "status": 400,
                    "body": { "success": false, "message": "No data provided" },
                })
            }
            Ok(payload) => match accept_data(state, &payload).await {
                DataReply::Now(response) => envelope(response),
                DataReply::Later(pending) => {
                    log_debug!("rendering {} readings off the read loop", pending.sequence().len());
                    tokio::spawn(async move {
                        let response = complete_sentence(pending).await;
                        if reply_tx.send(envelope(response)).is_err() {
                            log_debug!("bridge closed before the sentence was ready");
                        }
                    });
                    return Some(reply_rx);
                }
            },
        },
    };

    if reply_tx.send(reply).is_err() {
        log_debug!("reply dropped before it was queued");
    }
    Some(reply_rx)
}

/// Drains the broadcast feed into the debug log until cancelled.
pub async fn log_feed(state: &AppState, cancel_token: CancellationToken) {
    let (current, mut feed) = state.pipeline.subscribe().await;
    log_debug!("feed subscribed, current frame {}", current.bits());

    loop {
        tokio::select! {
            received = feed.recv() => match received {
                Ok(reading) => log_debug!("feed: {}", reading.bits()),
                Err(RecvError::Lagged(skipped)) => log_warn!("feed lagged, skipped {skipped} frames"),
                Err(RecvError::Closed) => break,
            },
            _ = cancel_token.cancelled() => break,
        }
    }
}
