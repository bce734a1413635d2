use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::protocol::error::{Result, SprpcError};

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Size of each transport read.
const READ_SIZE: usize = 8 * 1024;

/// A position in the buffer: fragment index plus offset within that fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Mark {
    fragment: usize,
    pos: usize,
}

/// Received fragments plus a cursor marking the unconsumed frontier.
///
/// The cursor always lives in `current`. Fragments the cursor has moved past
/// stay in `passed` only while a unit that started in them is still being
/// read, and are dropped as soon as that unit is taken.
pub(crate) struct FragmentBuffer<R> {
    reader: R,
    passed: VecDeque<Bytes>,
    current: Bytes,
    pos: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> FragmentBuffer<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            passed: VecDeque::new(),
            current: Bytes::new(),
            pos: 0,
            eof: false,
        }
    }

    /// Reads a CRLF-terminated line, consuming the CRLF but leaving it out of the result.
    pub(crate) async fn read_line(&mut self) -> Result<Bytes> {
        let start = self.tell();
        self.consume_through(CR).await?;
        if !self.consume_byte(LF).await? {
            return Err(SprpcError::InvalidResponse("CR not followed by LF".into()));
        }
        let line = self.take(start)?;
        Ok(line.slice(..line.len() - 2))
    }

    /// Reads exactly `n` bytes.
    pub(crate) async fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        let start = self.tell();
        self.consume_n(n).await?;
        self.take(start)
    }

    /// Consumes a CRLF pair, returning whether both bytes matched.
    pub(crate) async fn consume_crlf(&mut self) -> Result<bool> {
        let matched = self.consume_byte(CR).await? && self.consume_byte(LF).await?;
        self.compact();
        Ok(matched)
    }

    fn tell(&self) -> Mark {
        Mark {
            fragment: self.passed.len(),
            pos: self.pos,
        }
    }

    fn unread(&self) -> usize {
        self.current.len() - self.pos
    }

    fn current_consumed(&self) -> bool {
        self.pos == self.current.len()
    }

    async fn consume_n(&mut self, mut n: usize) -> Result<()> {
        while n > 0 {
            if self.current_consumed() {
                self.load().await?;
            }
            let m = n.min(self.unread());
            self.pos += m;
            n -= m;
        }
        Ok(())
    }

    /// Advances past the next occurrence of `delimiter`.
    async fn consume_through(&mut self, delimiter: u8) -> Result<()> {
        loop {
            if self.current_consumed() {
                self.load().await?;
            }
            match self.current[self.pos..].iter().position(|b| *b == delimiter) {
                Some(i) => {
                    self.pos += i + 1;
                    return Ok(());
                }
                None => self.pos = self.current.len(),
            }
        }
    }

    async fn consume_byte(&mut self, expected: u8) -> Result<bool> {
        if self.current_consumed() {
            self.load().await?;
        }
        if self.current[self.pos] != expected {
            return Ok(false);
        }
        self.pos += 1;
        Ok(true)
    }

    /// Pulls the next fragment from the transport.
    async fn load(&mut self) -> Result<()> {
        if !self.current_consumed() {
            return Err(SprpcError::Internal("fragment not fully consumed"));
        }
        if self.eof {
            return Err(SprpcError::NoMoreData);
        }

        let mut fragment = BytesMut::with_capacity(READ_SIZE);
        let n = self.reader.read_buf(&mut fragment).await?;
        if n == 0 {
            self.eof = true;
            return Err(SprpcError::NoMoreData);
        }

        let previous = std::mem::replace(&mut self.current, fragment.freeze());
        if !previous.is_empty() {
            self.passed.push_back(previous);
        }
        self.pos = 0;
        Ok(())
    }

    fn fragment(&self, index: usize) -> &Bytes {
        self.passed.get(index).unwrap_or(&self.current)
    }

    /// Returns the bytes between `from` and the cursor as one contiguous
    /// sequence, then drops every fragment the cursor has fully passed.
    fn take(&mut self, from: Mark) -> Result<Bytes> {
        let to = self.tell();
        if from.fragment > to.fragment || (from.fragment == to.fragment && from.pos > to.pos) {
            return Err(SprpcError::Internal("invalid buffer range"));
        }

        let bytes = if from.fragment == to.fragment {
            self.fragment(from.fragment).slice(from.pos..to.pos)
        } else {
            let mut joined = BytesMut::new();
            joined.extend_from_slice(&self.fragment(from.fragment)[from.pos..]);
            for index in from.fragment + 1..to.fragment {
                joined.extend_from_slice(self.fragment(index));
            }
            joined.extend_from_slice(&self.current[..to.pos]);
            joined.freeze()
        };

        self.compact();
        Ok(bytes)
    }

    /// Drops consumed fragments. Only valid when no unit is in progress.
    fn compact(&mut self) {
        self.passed.clear();
        if self.current_consumed() {
            self.current = Bytes::new();
            self.pos = 0;
        }
    }
}
