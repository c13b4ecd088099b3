//! Channels that carry clarification questions to a human and replies back.

use std::io::{BufRead, Write};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Source of human replies for a suspended run.
///
/// `ask` may wait indefinitely. Runs race it against their cancellation token,
/// so implementations need no timeout of their own.
#[async_trait]
pub trait HumanChannel: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String>;
}

/// Prints the question to stderr and reads one line from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleChannel;

#[async_trait]
impl HumanChannel for ConsoleChannel {
    async fn ask(&self, question: &str) -> Result<String> {
        let question = question.to_string();
        tokio::task::spawn_blocking(move || -> Result<String> {
            let mut stderr = std::io::stderr().lock();
            writeln!(stderr, "\n{question}\n").context("write question")?;
            write!(stderr, "> ").context("write prompt")?;
            stderr.flush().context("flush stderr")?;

            let mut line = String::new();
            let read = std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("read reply from stdin")?;
            if read == 0 {
                return Err(anyhow!("stdin closed before a reply was entered"));
            }
            Ok(line.trim_end_matches(['\r', '\n']).to_string())
        })
        .await
        .context("console reader task")?
    }
}

/// Replies fed from elsewhere in the process (a UI or session API).
///
/// Questions are published on an optional outbound sender so the feeding side
/// can display them.
#[derive(Debug)]
pub struct QueuedChannel {
    replies: Mutex<mpsc::Receiver<String>>,
    questions: Option<mpsc::UnboundedSender<String>>,
}

impl QueuedChannel {
    /// Channel plus the sender used to feed replies.
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                replies: Mutex::new(rx),
                questions: None,
            },
            tx,
        )
    }

    /// Publish every question asked on the returned receiver.
    pub fn with_question_feed(mut self) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.questions = Some(tx);
        (self, rx)
    }
}

#[async_trait]
impl HumanChannel for QueuedChannel {
    async fn ask(&self, question: &str) -> Result<String> {
        if let Some(feed) = &self.questions {
            // A dropped receiver only means nobody is displaying questions.
            let _ = feed.send(question.to_string());
        }
        debug!("waiting for queued clarification reply");
        let mut replies = self.replies.lock().await;
        replies
            .recv()
            .await
            .ok_or_else(|| anyhow!("reply channel closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queued_channel_returns_replies_in_order() {
        let (channel, tx) = QueuedChannel::new(4);
        tx.send("first".to_string()).await.expect("send");
        tx.send("second".to_string()).await.expect("send");

        assert_eq!(channel.ask("q1").await.expect("reply"), "first");
        assert_eq!(channel.ask("q2").await.expect("reply"), "second");
    }

    #[tokio::test]
    async fn queued_channel_publishes_questions() {
        let (channel, tx) = QueuedChannel::new(1);
        let (channel, mut questions) = channel.with_question_feed();
        tx.send("use option 2".to_string()).await.expect("send");

        let reply = channel.ask("Which option?").await.expect("reply");
        assert_eq!(reply, "use option 2");
        assert_eq!(questions.recv().await.as_deref(), Some("Which option?"));
    }

    #[tokio::test]
    async fn queued_channel_errors_when_sender_dropped() {
        let (channel, tx) = QueuedChannel::new(1);
        drop(tx);
        let err = channel.ask("anyone?").await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }
}
