//! Response body capture.
//!
//! Reading a response body consumes it, so the captured frames are kept and
//! replayed to the client afterwards. Whatever the downstream produced (data,
//! trailers, or an error part-way through) reaches the client unchanged and in
//! order.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Bytes, BytesMut};
use http_body::{Body, Frame, SizeHint};
use http_body_util::BodyExt;

/// Type-erased body error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn len_u64(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

/// Body that replays captured frames before polling the rest of the downstream body.
///
/// Created by [`capture_body`] or [`ReplayBody::passthrough`].
pub struct ReplayBody<B> {
    replay: VecDeque<Frame<Bytes>>,
    error: Option<BoxError>,
    rest: Option<Pin<Box<B>>>,
}

impl<B> ReplayBody<B> {
    /// Wrap `body` without capturing anything.
    #[must_use]
    pub fn passthrough(body: B) -> Self {
        Self {
            replay: VecDeque::new(),
            error: None,
            rest: Some(Box::pin(body)),
        }
    }

    fn buffered_len(&self) -> u64 {
        self.replay
            .iter()
            .filter_map(Frame::data_ref)
            .map(|d| len_u64(d.len()))
            .sum()
    }
}

impl<B> Body for ReplayBody<B>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if let Some(frame) = this.replay.pop_front() {
            return Poll::Ready(Some(Ok(frame)));
        }
        if let Some(err) = this.error.take() {
            return Poll::Ready(Some(Err(err)));
        }
        let Some(rest) = this.rest.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(rest.as_mut().poll_frame(cx)) {
            Some(Ok(frame)) => Poll::Ready(Some(Ok(frame))),
            Some(Err(e)) => {
                this.rest = None;
                Poll::Ready(Some(Err(e.into())))
            }
            None => {
                this.rest = None;
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.replay.is_empty()
            && self.error.is_none()
            && self.rest.as_ref().is_none_or(|rest| rest.is_end_stream())
    }

    fn size_hint(&self) -> SizeHint {
        let buffered = self.buffered_len();
        let Some(rest) = self.rest.as_ref() else {
            return SizeHint::with_exact(buffered);
        };

        let inner = rest.size_hint();
        let mut hint = SizeHint::new();
        hint.set_lower(inner.lower().saturating_add(buffered));
        if let Some(upper) = inner.upper() {
            hint.set_upper(upper.saturating_add(buffered));
        }
        hint
    }
}

/// Drain `body` into memory, up to `limit` bytes.
///
/// Returns the replaying body together with the captured bytes. The bytes are
/// `Some` only when the whole body was read without error and within `limit`.
pub async fn capture_body<B>(body: B, limit: usize) -> (ReplayBody<B>, Option<Bytes>)
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let mut rest = Box::pin(body);

    if rest.size_hint().lower() > len_u64(limit) {
        tracing::debug!(limit, "response body larger than capture limit");
        return (
            ReplayBody {
                replay: VecDeque::new(),
                error: None,
                rest: Some(rest),
            },
            None,
        );
    }

    let mut replay = VecDeque::new();
    let mut collected = BytesMut::new();

    loop {
        match rest.frame().await {
            None => {
                let body = ReplayBody {
                    replay,
                    error: None,
                    rest: None,
                };
                return (body, Some(collected.freeze()));
            }
            Some(Err(e)) => {
                let body = ReplayBody {
                    replay,
                    error: Some(e.into()),
                    rest: None,
                };
                return (body, None);
            }
            Some(Ok(frame)) => {
                let fits = frame
                    .data_ref()
                    .is_none_or(|d| collected.len() + d.len() <= limit);
                if fits {
                    if let Some(data) = frame.data_ref() {
                        collected.extend_from_slice(data);
                    }
                }
                replay.push_back(frame);

                if !fits {
                    tracing::debug!(limit, "response body exceeded capture limit");
                    let body = ReplayBody {
                        replay,
                        error: None,
                        rest: Some(rest),
                    };
                    return (body, None);
                }
            }
        }
    }
}
