//! MJPEG video feed.
//!
//! Each client gets a `multipart/x-mixed-replace` chunked response and one
//! receiver on [`FRAMES`]; a frame is only written when the camera has
//! published a new one.

use embassy_time::{with_timeout, Duration};
use embedded_io_async::Write;
use picoserve::response::chunked::{ChunkWriter, Chunks, ChunksWritten};

use crate::utils::{lifecycle, vision::FRAMES};

const FRAME_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
const POLL: Duration = Duration::from_millis(500);

pub struct VideoFeed;

impl Chunks for VideoFeed {
    fn content_type(&self) -> &'static str {
        "multipart/x-mixed-replace; boundary=frame"
    }

    async fn write_chunks<W: Write>(
        self,
        mut chunk_writer: ChunkWriter<W>,
    ) -> Result<ChunksWritten, W::Error> {
        let Some(mut frames) = FRAMES.receiver() else {
            tracing::warn!("video feed client limit reached");
            chunk_writer
                .write_chunk(b"--frame\r\nContent-Type: text/plain\r\n\r\ntoo many viewers\r\n")
                .await?;
            return chunk_writer.finalize().await;
        };
        tracing::info!("video feed client connected");

        while lifecycle::is_running() {
            let Ok(frame) = with_timeout(POLL, frames.changed()).await else {
                continue;
            };
            chunk_writer.write_chunk(FRAME_HEADER).await?;
            chunk_writer.write_chunk(&frame).await?;
            chunk_writer.write_chunk(b"\r\n").await?;
        }
        chunk_writer.finalize().await
    }
}
