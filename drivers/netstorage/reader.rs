//! Offset reads over a full-object download / 偏移读取
//!
//! The download action always starts at byte 0, so a positive offset is
//! honoured by discarding the leading bytes of the stream.

use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// Bytes discarded per read while skipping
const SKIP_CHUNK: usize = 16 * 1024;

pub struct OffsetReader<R> {
    inner: R,
    offset: u64,
    skipped: u64,
    scratch: Option<Vec<u8>>,
}

impl<R: AsyncRead + Unpin> OffsetReader<R> {
    pub fn new(inner: R, offset: u64) -> Self {
        let scratch = (offset > 0).then(|| vec![0u8; SKIP_CHUNK]);
        Self { inner, offset, skipped: 0, scratch }
    }

    /// Discard bytes until `offset` is reached; EOF before that ends the stream
    fn poll_skip(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<bool>> {
        while self.skipped < self.offset {
            let Some(scratch) = self.scratch.as_mut() else {
                break;
            };
            let want = (self.offset - self.skipped).min(scratch.len() as u64) as usize;
            let mut buf = ReadBuf::new(&mut scratch[..want]);
            ready!(Pin::new(&mut self.inner).poll_read(cx, &mut buf))?;

            let n = buf.filled().len();
            if n == 0 {
                self.scratch = None;
                return Poll::Ready(Ok(false));
            }
            self.skipped += n as u64;
        }
        self.scratch = None;
        Poll::Ready(Ok(true))
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for OffsetReader<R> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        if self.skipped < self.offset {
            // Past the end of the object: nothing to return
            if !ready!(self.poll_skip(cx))? {
                self.offset = self.skipped;
                return Poll::Ready(Ok(()));
            }
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}
