//! Idle deadline for streamed upstream bodies.

use crate::exchange::{BoxError, StreamBody};
use bytes::Bytes;
use hyper::body::{Body, Frame, SizeHint};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{sleep, Instant, Sleep};
use tracing::warn;

/// Wraps an upstream response body and fails it when no frame arrives for
/// `timeout`. The clock starts on the first poll and restarts after every
/// frame.
pub(crate) struct IdleTimeoutBody {
    inner: StreamBody,
    timeout: Duration,
    idle: Option<Pin<Box<Sleep>>>,
    expired: bool,
}

impl IdleTimeoutBody {
    pub(crate) fn new(inner: StreamBody, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            idle: None,
            expired: false,
        }
    }
}

impl Body for IdleTimeoutBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.expired {
            return Poll::Ready(None);
        }

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(frame) => {
                if let Some(idle) = this.idle.as_mut() {
                    idle.as_mut().reset(Instant::now() + this.timeout);
                }
                Poll::Ready(frame)
            }
            Poll::Pending => {
                let timeout = this.timeout;
                let idle = this.idle.get_or_insert_with(|| Box::pin(sleep(timeout)));
                if idle.as_mut().poll(cx).is_pending() {
                    return Poll::Pending;
                }
                this.expired = true;
                warn!("Upstream body idle for {}ms, aborting", timeout.as_millis());
                let err = io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("Upstream body idle for {}ms", timeout.as_millis()),
                );
                Poll::Ready(Some(Err(err.into())))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        !self.expired && self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::body::full;
    use futures::{stream, StreamExt};
    use http_body_util::{BodyExt, StreamBody as FrameStream};

    #[tokio::test]
    async fn test_passes_frames_through() {
        let body = IdleTimeoutBody::new(full("complete"), Duration::from_millis(50));
        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(&collected[..], b"complete");
    }

    #[tokio::test]
    async fn test_fails_stalled_body() {
        let frames: Vec<Result<Frame<Bytes>, BoxError>> =
            vec![Ok(Frame::data(Bytes::from_static(b"partial")))];
        let stalled = BodyExt::boxed(FrameStream::new(
            stream::iter(frames).chain(stream::pending()),
        ));

        let started = std::time::Instant::now();
        let Err(err) = IdleTimeoutBody::new(stalled, Duration::from_millis(100))
            .collect()
            .await
        else {
            panic!("stalled body completed");
        };
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(err.to_string().contains("idle for 100ms"));
    }
}
