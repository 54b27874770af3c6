//! Destinations for the child's forwarded output

use std::fmt;
use std::io;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// Which child stream a line was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// One line of child output, without its line terminator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub stream: StreamKind,
    pub line: String,
}

/// Receives forwarded output lines
///
/// Called from the forwarder tasks; lines from stdout and stderr may
/// interleave in any order.
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn write_line(&self, line: OutputLine) -> io::Result<()>;
}

/// Forwards child stdout to our stdout and child stderr to our stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

#[async_trait]
impl OutputSink for ConsoleSink {
    async fn write_line(&self, line: OutputLine) -> io::Result<()> {
        let mut buf = line.line.into_bytes();
        buf.push(b'\n');

        match line.stream {
            StreamKind::Stdout => {
                let mut out = tokio::io::stdout();
                out.write_all(&buf).await?;
                out.flush().await
            }
            StreamKind::Stderr => {
                let mut err = tokio::io::stderr();
                err.write_all(&buf).await?;
                err.flush().await
            }
        }
    }
}

/// Pushes lines onto a tokio channel
///
/// Sending waits for capacity, so a slow receiver applies backpressure to the
/// child through its pipes.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<OutputLine>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(tx: mpsc::Sender<OutputLine>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutputLine>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl OutputSink for ChannelSink {
    async fn write_line(&self, line: OutputLine) -> io::Result<()> {
        self.tx
            .send(line)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "output receiver dropped"))
    }
}
