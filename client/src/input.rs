//! Local test commands typed into the client's own console
//!
//! Lines are read on a background task and drained once per frame, so local
//! commands go through the same per-tick path as network frames. Numeric-pad
//! digits are accepted as shortcuts: 4 left, 6 right, 8 jump, 2 slide.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

/// Maps a keypad digit to its command token; other input passes through.
pub fn expand_shortcut(line: &str) -> &str {
    match line.trim() {
        "4" => "left",
        "6" => "right",
        "8" => "jump",
        "2" => "slide",
        _ => line,
    }
}

pub struct LocalInput {
    lines: mpsc::UnboundedReceiver<String>,
}

impl LocalInput {
    /// Starts reading newline-delimited commands from `reader`.
    pub fn spawn<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, lines) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                if tx.send(expand_shortcut(&line).to_string()).is_err() {
                    break;
                }
            }
        });

        Self { lines }
    }

    /// Returns every line received since the previous call.
    pub fn drain(&mut self) -> Vec<String> {
        let mut pending = Vec::new();
        while let Ok(line) = self.lines.try_recv() {
            pending.push(line);
        }
        pending
    }
}
