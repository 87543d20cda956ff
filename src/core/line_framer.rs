// src/core/line_framer.rs

use crate::models::TrailingLinePolicy;
use std::borrow::Cow;

/// Receives the decoded lines of one output stream, terminator stripped.
///
/// Any `FnMut(&str) + Send` closure is a sink. Annotate the parameter type
/// (`|line: &str| ...`) when passing a closure so it accepts every lifetime.
pub trait LineSink: Send {
    /// Called once per line, in stream order.
    fn on_line(&mut self, line: &str);
}

impl<F> LineSink for F
where
    F: FnMut(&str) + Send,
{
    fn on_line(&mut self, line: &str) {
        self(line);
    }
}

/// Reassembles arbitrary byte chunks into `\n`-terminated lines.
///
/// Bytes after the last newline are held until the next chunk arrives, so a line
/// (or a multi-byte UTF-8 character) split across two reads is delivered whole.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
    policy: TrailingLinePolicy,
    delivered: usize,
}

impl LineFramer {
    /// Creates an empty framer that handles a trailing fragment with `policy`.
    pub fn new(policy: TrailingLinePolicy) -> Self {
        Self {
            pending: Vec::new(),
            policy,
            delivered: 0,
        }
    }

    /// Feeds one chunk and delivers every line it completes.
    pub fn push<S>(&mut self, chunk: &[u8], sink: &mut S)
    where
        S: LineSink + ?Sized,
    {
        let mut rest = chunk;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (head, tail) = rest.split_at(pos);
            if self.pending.is_empty() {
                self.emit(head, sink);
            } else {
                self.pending.extend_from_slice(head);
                let line = std::mem::take(&mut self.pending);
                self.emit(&line, sink);
            }
            rest = tail.get(1..).unwrap_or_default();
        }
        self.pending.extend_from_slice(rest);
    }

    /// Ends the stream. The unterminated remainder, if any, is delivered or dropped
    /// according to the policy. Returns the number of lines delivered overall.
    pub fn finish<S>(mut self, sink: &mut S) -> usize
    where
        S: LineSink + ?Sized,
    {
        if !self.pending.is_empty() {
            match self.policy {
                TrailingLinePolicy::Flush => {
                    let line = std::mem::take(&mut self.pending);
                    self.emit(&line, sink);
                }
                TrailingLinePolicy::Drop => {
                    log::debug!(
                        "Dropping {} unterminated trailing byte(s) at end of stream.",
                        self.pending.len()
                    );
                }
            }
        }
        self.delivered
    }

    /// Bytes received after the last newline.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    fn emit<S>(&mut self, bytes: &[u8], sink: &mut S)
    where
        S: LineSink + ?Sized,
    {
        let line: Cow<'_, str> = String::from_utf8_lossy(bytes);
        sink.on_line(&line);
        self.delivered += 1;
    }
}
