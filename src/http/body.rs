//! Relayed bodies with a deadline between frames.
//!
//! A backend that sends its response head and then stalls, or a client that
//! stops mid-upload, must not hold a connection forever. The deadline is armed
//! when the consumer asks for the next frame and disarmed when one arrives, so
//! a slow reader on the other side never counts against the producer.

use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use axum::BoxError;
use hyper::body::{Body, Frame, SizeHint};
use tokio::time::{Instant, Sleep};

/// The body produced no frame within the idle limit.
#[derive(Debug, thiserror::Error)]
#[error("body stalled for more than {0:?}")]
pub struct BodyIdleTimeout(pub Duration);

/// Body wrapper that fails once `idle` passes without a frame.
///
/// Length and end-of-stream hints are passed through so the framing hyper
/// picks for the relayed message does not change.
pub struct IdleTimeoutBody<B> {
    inner: B,
    idle: Duration,
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl<B> IdleTimeoutBody<B> {
    pub fn new(idle: Duration, inner: B) -> Self {
        Self {
            inner,
            idle,
            sleep: Box::pin(tokio::time::sleep(idle)),
            armed: false,
        }
    }
}

impl<B> Body for IdleTimeoutBody<B>
where
    B: Body + Unpin,
    B::Error: Into<BoxError>,
{
    type Data = B::Data;
    type Error = BoxError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if !this.armed {
            this.sleep.as_mut().reset(Instant::now() + this.idle);
            this.armed = true;
        }
        if this.sleep.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Some(Err(Box::new(BodyIdleTimeout(this.idle)))));
        }

        let frame = ready!(Pin::new(&mut this.inner).poll_frame(cx));
        this.armed = false;
        Poll::Ready(frame.map(|result| result.map_err(Into::into)))
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body as AxumBody, Bytes};
    use futures_util::{stream, StreamExt};

    #[tokio::test]
    async fn passes_complete_bodies_and_hints_through() {
        let body = IdleTimeoutBody::new(Duration::from_secs(1), AxumBody::from("hello"));
        assert_eq!(body.size_hint().exact(), Some(5));

        let bytes = to_bytes(AxumBody::new(body), usize::MAX).await.unwrap();
        assert_eq!(bytes, "hello");

        let empty = IdleTimeoutBody::new(Duration::from_secs(1), AxumBody::empty());
        assert!(empty.is_end_stream());
    }

    #[tokio::test]
    async fn stalled_body_fails_after_idle_limit() {
        let chunks = stream::iter([Ok::<_, std::io::Error>(Bytes::from_static(b"0123456789"))])
            .chain(stream::pending());
        let body = IdleTimeoutBody::new(Duration::from_millis(200), AxumBody::from_stream(chunks));

        let read = tokio::time::timeout(Duration::from_secs(5), to_bytes(AxumBody::new(body), usize::MAX));
        assert!(read.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn steady_frames_reset_the_deadline() {
        let chunks = stream::unfold(0u8, |n| async move {
            if n == 4 {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
            Some((Ok::<_, std::io::Error>(Bytes::from(vec![b'x'])), n + 1))
        });
        // Four frames take longer than the limit in total, but no single gap does.
        let body = IdleTimeoutBody::new(Duration::from_millis(400), AxumBody::from_stream(chunks));

        let bytes = to_bytes(AxumBody::new(body), usize::MAX).await.unwrap();
        assert_eq!(bytes, "xxxx");
    }
}
