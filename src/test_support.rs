use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::{
    broadcast::BroadcastHub,
    config::AppConfig,
    db::Database,
    interpret::{Interpreter, TextGenerator},
    sequence::PipelineController,
    AppState,
};

/// Replies with canned sentences in order, then fails.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedGenerator {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("script exhausted"))
    }
}

/// Answers every prompt with the same sentence after a fixed delay.
pub struct SlowGenerator {
    delay: Duration,
    reply: String,
}

#[async_trait]
impl TextGenerator for SlowGenerator {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        Ok(self.reply.clone())
    }
}

fn state_with(generator: Arc<dyn TextGenerator>, timeout: Duration) -> AppState {
    let config = AppConfig::default();
    let db = Database::in_memory().unwrap();
    let hub = BroadcastHub::new(db.clone(), config.broadcast.capacity);
    let interpreter = Interpreter::new(generator, timeout);
    AppState {
        pipeline: PipelineController::new(config.buffer.clone(), interpreter, db, hub),
        config,
    }
}

pub fn scripted_state(replies: &[&str]) -> AppState {
    state_with(
        Arc::new(ScriptedGenerator::new(replies)),
        Duration::from_secs(1),
    )
}

pub fn slow_state(delay: Duration, reply: &str) -> AppState {
    let generator = SlowGenerator {
        delay,
        reply: reply.to_string(),
    };
    state_with(Arc::new(generator), delay * 10)
}
