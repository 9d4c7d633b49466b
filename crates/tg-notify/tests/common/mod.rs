//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tg_notify::{ChannelError, NotifierConfig, NotifyChannel, ParseMode};
use tokio::sync::mpsc;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

// =============================================================================
// Recording channel
// =============================================================================

/// A message handed to the recording channel.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: String,
    pub text: String,
    pub parse_mode: ParseMode,
}

/// Channel that records every message and optionally fails on purpose.
pub struct RecordingChannel {
    tx: mpsc::UnboundedSender<SentMessage>,
    fail: bool,
    closed: AtomicBool,
}

impl RecordingChannel {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<SentMessage>) {
        Self::build(false)
    }

    /// Records the attempt, then reports a simulated outage.
    pub fn failing() -> (Arc<Self>, mpsc::UnboundedReceiver<SentMessage>) {
        Self::build(true)
    }

    fn build(fail: bool) -> (Arc<Self>, mpsc::UnboundedReceiver<SentMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = Arc::new(Self {
            tx,
            fail,
            closed: AtomicBool::new(false),
        });
        (channel, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotifyChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: ParseMode,
    ) -> Result<(), ChannelError> {
        let _ = self.tx.send(SentMessage {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            parse_mode,
        });

        if self.fail {
            Err(ChannelError::Other("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Configuration that never installs a global subscriber.
pub fn test_config() -> NotifierConfig {
    NotifierConfig::new("T0K", "C").with_app_name("Bot").with_logging(false)
}

// =============================================================================
// Log capture
// =============================================================================

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Capture log output of the current thread until the guard is dropped.
pub fn capture_logs() -> (LogBuffer, DefaultGuard) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}
