// SPDX-License-Identifier: GPL-3.0-only

//! In-process video sink
//!
//! [`VideoElement`] plays the role of a video element: it holds the current
//! source (a frame receiver) and hands frames to whoever asks for the next
//! one. Clearing the source takes effect immediately for new readers; a
//! reader already waiting keeps its receiver until the stream ends.

use super::{CameraError, CameraFrame, CameraResult, FrameReceiver, VideoSink};
use futures::StreamExt;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

type SharedSource = Arc<tokio::sync::Mutex<FrameReceiver>>;

struct Source {
    stream_id: String,
    frames: SharedSource,
}

/// Video sink backed by a frame channel
#[derive(Default)]
pub struct VideoElement {
    source: Mutex<Option<Source>>,
    playing: AtomicBool,
}

impl VideoElement {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the attached stream, if any
    pub fn stream_id(&self) -> Option<String> {
        self.lock_source().as_ref().map(|s| s.stream_id.clone())
    }

    /// Whether `play()` succeeded for the current source
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn lock_source(&self) -> std::sync::MutexGuard<'_, Option<Source>> {
        self.source.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl VideoSink for VideoElement {
    fn attach(&self, stream_id: &str, frames: FrameReceiver) -> CameraResult<()> {
        debug!(stream = %stream_id, "Attaching stream to video sink");
        *self.lock_source() = Some(Source {
            stream_id: stream_id.to_string(),
            frames: Arc::new(tokio::sync::Mutex::new(frames)),
        });
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn play(&self) -> BoxFuture<'_, CameraResult<()>> {
        Box::pin(async move {
            if self.lock_source().is_none() {
                return Err(CameraError::Other("no source attached".into()));
            }
            self.playing.store(true, Ordering::SeqCst);
            Ok(())
        })
    }

    fn clear_source(&self) -> CameraResult<()> {
        if let Some(source) = self.lock_source().take() {
            debug!(stream = %source.stream_id, "Cleared video sink source");
        }
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn has_source(&self) -> bool {
        self.lock_source().is_some()
    }

    fn next_frame(&self) -> BoxFuture<'_, Option<CameraFrame>> {
        Box::pin(async move {
            let frames = {
                let source = self.lock_source();
                Arc::clone(&source.as_ref()?.frames)
            };
            let mut receiver = frames.lock().await;
            receiver.next().await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use futures::channel::mpsc;

    #[tokio::test]
    async fn test_frames_flow_until_cleared() {
        let sink = VideoElement::new();
        assert!(!sink.has_source());
        assert!(sink.next_frame().await.is_none());
        assert!(sink.play().await.is_err());

        let (mut tx, rx) = mpsc::channel(4);
        sink.attach("stream-1", rx).unwrap();
        sink.play().await.unwrap();
        assert!(sink.is_playing());
        assert_eq!(sink.stream_id().as_deref(), Some("stream-1"));

        tx.send(CameraFrame::gray(2, 1, vec![0, 255])).await.unwrap();
        let frame = sink.next_frame().await.unwrap();
        assert_eq!(frame.width, 2);

        sink.clear_source().unwrap();
        assert!(!sink.has_source());
        assert!(!sink.is_playing());
        assert!(sink.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_source_end_yields_none() {
        let sink = VideoElement::new();
        let (tx, rx) = mpsc::channel::<CameraFrame>(1);
        sink.attach("stream-2", rx).unwrap();
        drop(tx);
        assert!(sink.next_frame().await.is_none());
    }
}
