//! Chunked transfer channel
//!
//! A bounded producer/consumer channel for moving large byte payloads (raw PCM
//! from a decode process, serialized picture data) in fixed-size chunks. The
//! producer ends the stream with an explicit completion message that names
//! the track the payload belongs to; a stream that ends without one is
//! incomplete and must be discarded.

use crate::error::{CoreError, Result};
use crate::types::TrackRef;
use tokio::sync::mpsc;

/// Default chunk size (256 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// Message carried by the transfer channel
#[derive(Debug)]
pub enum TransferMessage {
    /// Next piece of the payload
    Chunk(Vec<u8>),
    /// Payload finished
    Complete {
        /// Track the payload belongs to
        track: TrackRef,
    },
}

/// Create a transfer channel holding at most `capacity` in-flight messages
pub fn chunk_channel(capacity: usize, chunk_size: usize) -> (ChunkSender, ChunkReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ChunkSender {
            tx,
            chunk_size: chunk_size.max(1),
        },
        ChunkReceiver { rx },
    )
}

/// Producer half of a transfer
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: mpsc::Sender<TransferMessage>,
    chunk_size: usize,
}

impl ChunkSender {
    /// Size of the chunks this sender emits
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Send one chunk as-is
    pub async fn send_chunk(&self, bytes: Vec<u8>) -> Result<()> {
        self.tx
            .send(TransferMessage::Chunk(bytes))
            .await
            .map_err(|_| CoreError::TransferClosed)
    }

    /// Split `bytes` into chunks and send them in order
    pub async fn send_all(&self, bytes: &[u8]) -> Result<()> {
        for piece in bytes.chunks(self.chunk_size) {
            self.send_chunk(piece.to_vec()).await?;
        }
        Ok(())
    }

    /// Signal completion, consuming the sender
    pub async fn complete(self, track: TrackRef) -> Result<()> {
        self.tx
            .send(TransferMessage::Complete { track })
            .await
            .map_err(|_| CoreError::TransferClosed)
    }

    /// Blocking variant of [`send_all`](Self::send_all) for producers on worker threads
    ///
    /// Must not be called from inside an async context.
    pub fn blocking_send_all(&self, bytes: &[u8]) -> Result<()> {
        for piece in bytes.chunks(self.chunk_size) {
            self.tx
                .blocking_send(TransferMessage::Chunk(piece.to_vec()))
                .map_err(|_| CoreError::TransferClosed)?;
        }
        Ok(())
    }

    /// Blocking variant of [`complete`](Self::complete)
    pub fn blocking_complete(self, track: TrackRef) -> Result<()> {
        self.tx
            .blocking_send(TransferMessage::Complete { track })
            .map_err(|_| CoreError::TransferClosed)
    }
}

/// Reassembled payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transferred {
    /// Track named by the completion signal
    pub track: TrackRef,
    /// Concatenated chunks
    pub bytes: Vec<u8>,
    /// Number of chunks received
    pub chunks: usize,
}

/// Consumer half of a transfer
#[derive(Debug)]
pub struct ChunkReceiver {
    rx: mpsc::Receiver<TransferMessage>,
}

impl ChunkReceiver {
    /// Receive the next message, `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<TransferMessage> {
        self.rx.recv().await
    }

    /// Drain the channel and reassemble the payload
    ///
    /// # Errors
    /// Returns `TransferIncomplete` if the producer went away without sending
    /// a completion signal
    pub async fn collect(mut self) -> Result<Transferred> {
        let mut bytes = Vec::new();
        let mut chunks = 0;
        while let Some(message) = self.rx.recv().await {
            match message {
                TransferMessage::Chunk(chunk) => {
                    bytes.extend_from_slice(&chunk);
                    chunks += 1;
                }
                TransferMessage::Complete { track } => {
                    return Ok(Transferred {
                        track,
                        bytes,
                        chunks,
                    });
                }
            }
        }
        Err(CoreError::TransferIncomplete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn payload_is_split_and_reassembled() {
        let (tx, rx) = chunk_channel(4, 4);
        let payload: Vec<u8> = (0..10).collect();

        let producer = {
            let payload = payload.clone();
            tokio::spawn(async move {
                tx.send_all(&payload).await.unwrap();
                tx.complete(TrackRef::from("/music/a.flac")).await.unwrap();
            })
        };

        let transferred = rx.collect().await.unwrap();
        producer.await.unwrap();

        assert_eq!(transferred.bytes, payload);
        assert_eq!(transferred.chunks, 3);
        assert_eq!(transferred.track, TrackRef::from("/music/a.flac"));
    }

    #[tokio::test]
    async fn missing_completion_is_an_error() {
        let (tx, rx) = chunk_channel(4, DEFAULT_CHUNK_SIZE);
        tx.send_chunk(vec![1, 2, 3]).await.unwrap();
        drop(tx);

        assert!(matches!(rx.collect().await, Err(CoreError::TransferIncomplete)));
    }

    #[tokio::test]
    async fn blocking_producer_on_worker_thread() {
        let (tx, rx) = chunk_channel(2, 3);
        let worker = tokio::task::spawn_blocking(move || {
            tx.blocking_send_all(b"abcdefg").unwrap();
            tx.blocking_complete(TrackRef::from("/music/b.mp3")).unwrap();
        });

        let transferred = rx.collect().await.unwrap();
        worker.await.unwrap();
        assert_eq!(transferred.bytes, b"abcdefg");
        assert_eq!(transferred.chunks, 3);
    }

    #[tokio::test]
    async fn dropped_receiver_closes_transfer() {
        let (tx, rx) = chunk_channel(1, 8);
        drop(rx);
        assert!(matches!(
            tx.send_chunk(vec![0]).await,
            Err(CoreError::TransferClosed)
        ));
    }
}
