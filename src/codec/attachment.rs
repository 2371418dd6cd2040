//! Streaming base64 attachment encoder.
//!
//! Attachment content is written as the character data of a single XML
//! element without ever holding the whole file (or its encoding) in memory.
//!
//! A blocking producer task reads the source through a base64
//! [`EncoderWriter`] whose sink cuts the encoded text into [`CHUNK_SIZE`]
//! chunks and pushes them into a bounded channel. The caller's task drains
//! the channel and writes each chunk as one text event, in arrival order.
//! The channel bound gives backpressure: the producer blocks while
//! [`CHANNEL_CAPACITY`] chunks are waiting.

use std::io::{self, Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::write::EncoderWriter;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::MantisError;

/// Size of one encoded chunk, and of one text event.
pub const CHUNK_SIZE: usize = 4096;

/// Number of encoded chunks that may wait between producer and consumer.
pub const CHANNEL_CAPACITY: usize = 2;

/// Source bytes read per step; encodes to exactly one chunk.
const READ_SIZE: usize = CHUNK_SIZE / 4 * 3;

type Chunk = Result<String, MantisError>;

/// Writes `<tag>base64(source)</tag>` to `writer`, streaming the content.
///
/// The end tag is written on every exit path, so the document stays
/// well-formed even when encoding fails or is cancelled. The first error
/// (source I/O, writer failure or cancellation) is returned after the
/// element is closed.
///
/// # Errors
///
/// - `MantisError::Attachment` if reading the source fails
/// - `MantisError::Cancelled` if `cancel` fires before the source is drained
/// - `MantisError::Marshal` if the XML writer fails
pub async fn write_base64_element<W, R>(
    writer: &mut Writer<W>,
    tag: &str,
    source: R,
    cancel: &CancellationToken,
) -> Result<(), MantisError>
where
    W: Write,
    R: Read + Send + 'static,
{
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(|e| MantisError::marshal(tag, e.to_string()))?;

    let (tx, mut rx) = mpsc::channel::<Chunk>(CHANNEL_CAPACITY);
    let producer_cancel = cancel.child_token();
    let producer = {
        let producer_cancel = producer_cancel.clone();
        tokio::task::spawn_blocking(move || produce(source, tx, producer_cancel))
    };

    let mut result = Ok(());
    let mut chunks = 0usize;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                result = Err(MantisError::Cancelled);
                break;
            }
            next = rx.recv() => next,
        };
        match next {
            Some(Ok(chunk)) => {
                chunks += 1;
                if let Err(e) = writer.write_event(Event::Text(BytesText::from_escaped(chunk))) {
                    result = Err(MantisError::marshal(tag, e.to_string()));
                    break;
                }
            }
            Some(Err(e)) => {
                result = Err(e);
                break;
            }
            None => break,
        }
    }

    // Dropping the receiver unblocks a producer waiting on a full channel.
    drop(rx);
    if result.is_ok() {
        if let Err(e) = producer.await {
            result = Err(MantisError::Attachment(io::Error::other(format!(
                "attachment encoder task failed: {}",
                e
            ))));
        }
    } else {
        producer_cancel.cancel();
    }

    match &result {
        Ok(()) => tracing::debug!(tag, chunks, "attachment encoded"),
        Err(e) => tracing::debug!(tag, chunks, error = %e, "attachment encoding aborted"),
    }

    let closed = writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(|e| MantisError::marshal(tag, e.to_string()));
    result.and(closed)
}

/// Producer side: encodes `source` into the channel, then reports the
/// terminal error (if any) as the last item.
fn produce<R: Read>(mut source: R, tx: mpsc::Sender<Chunk>, cancel: CancellationToken) {
    let error_tx = tx.clone();
    match encode_into(&mut source, tx, &cancel) {
        Ok(total) => tracing::trace!(bytes = total, "attachment source drained"),
        Err(e) => {
            // A closed channel means the consumer already gave up.
            let _ = error_tx.blocking_send(Err(e));
        }
    }
}

fn encode_into<R: Read>(
    source: &mut R,
    tx: mpsc::Sender<Chunk>,
    cancel: &CancellationToken,
) -> Result<u64, MantisError> {
    let mut encoder = EncoderWriter::new(ChunkSink::new(tx), &STANDARD);
    let mut buf = vec![0u8; READ_SIZE];
    let mut total = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(MantisError::Cancelled);
        }
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(MantisError::Attachment(e)),
        };
        encoder
            .write_all(&buf[..n])
            .map_err(MantisError::Attachment)?;
        total += n as u64;
    }

    // Flushes the trailing group and its padding into the sink.
    let mut sink = encoder.finish().map_err(MantisError::Attachment)?;
    sink.send_pending().map_err(MantisError::Attachment)?;
    Ok(total)
}

/// Collects encoded bytes and sends them on as fixed-size chunks.
struct ChunkSink {
    tx: mpsc::Sender<Chunk>,
    pending: Vec<u8>,
}

impl ChunkSink {
    fn new(tx: mpsc::Sender<Chunk>) -> Self {
        Self {
            tx,
            pending: Vec::with_capacity(CHUNK_SIZE),
        }
    }

    fn send_pending(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.pending, Vec::with_capacity(CHUNK_SIZE));
        let text = String::from_utf8(chunk)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.tx
            .blocking_send(Ok(text))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "attachment consumer closed"))
    }
}

impl Write for ChunkSink {
    fn write(&mut self, mut buf: &[u8]) -> io::Result<usize> {
        let len = buf.len();
        while !buf.is_empty() {
            let n = (CHUNK_SIZE - self.pending.len()).min(buf.len());
            self.pending.extend_from_slice(&buf[..n]);
            buf = &buf[n..];
            if self.pending.len() == CHUNK_SIZE {
                self.send_pending()?;
            }
        }
        Ok(len)
    }

    fn flush(&mut self) -> io::Result<()> {
        // Partial chunks are only sent once the encoder is finished.
        Ok(())
    }
}
