//! Newline-delimited JSON-RPC framing, shared by both pump directions.
//!
//! One JSON object per line, UTF-8, at least 8 MiB per message (§6.1).
//! Oversized or non-UTF-8 frames are reported so the caller can skip them
//! with a warning instead of letting an unbounded line exhaust memory.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Minimum guaranteed line length before a frame is reported oversized.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// The result of reading one frame from a line-delimited stream.
#[derive(Debug)]
pub enum Frame {
    /// A complete line, with the trailing `\n`/`\r\n` stripped.
    Line(String),
    /// The stream reached EOF before another line started.
    Eof,
    /// A line exceeded [`MAX_FRAME_BYTES`] or was not valid UTF-8; already
    /// fully consumed from the reader, so the next call resumes cleanly on
    /// the following line.
    Oversized,
}

fn finish_line(mut buf: Vec<u8>) -> Frame {
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    match String::from_utf8(buf) {
        Ok(s) => Frame::Line(s),
        Err(_) => Frame::Oversized,
    }
}

/// Read one `\n`-terminated frame from `reader`, capping accumulation at
/// [`MAX_FRAME_BYTES`]. Unlike `AsyncBufReadExt::lines`, an over-long line
/// never grows the buffer past the cap — once capped, bytes are discarded
/// until the next newline and [`Frame::Oversized`] is returned.
pub async fn read_frame<R>(reader: &mut R) -> std::io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::new();
    let mut capped = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(if buf.is_empty() && !capped {
                Frame::Eof
            } else if capped {
                Frame::Oversized
            } else {
                finish_line(buf)
            });
        }
        if let Some(pos) = available.iter().position(|&b| b == b'\n') {
            if !capped && buf.len() + pos <= MAX_FRAME_BYTES {
                buf.extend_from_slice(&available[..pos]);
            } else {
                capped = true;
            }
            reader.consume(pos + 1);
            return Ok(if capped { Frame::Oversized } else { finish_line(buf) });
        }
        if !capped && buf.len() + available.len() <= MAX_FRAME_BYTES {
            buf.extend_from_slice(available);
        } else {
            capped = true;
        }
        let consumed = available.len();
        reader.consume(consumed);
    }
}

/// Write one line, appending `\n` and flushing so upstream/client see it
/// promptly rather than sitting in an internal buffer.
pub async fn write_frame<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
