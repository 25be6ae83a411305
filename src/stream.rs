use actix_web::web::Bytes;
use futures_core::Stream;
use std::{
    pin::Pin,
    task::{Context, Poll},
};
use streem::IntoStreamer;

#[derive(Debug, thiserror::Error)]
#[error("File exceeds the maximum allowed size of {limit} bytes")]
pub(crate) struct LimitError {
    pub(crate) limit: u64,
}

/// Convert a stream's errors into another error type
pub(crate) fn from_err<S, T, E1, E2>(stream: S) -> impl Stream<Item = Result<T, E2>>
where
    S: Stream<Item = Result<T, E1>> + 'static,
    T: 'static,
    E1: Into<E2> + 'static,
    E2: 'static,
{
    streem::from_fn(|yielder| async move {
        let stream = std::pin::pin!(stream);
        let mut streamer = stream.into_streamer();

        while let Some(res) = streamer.next().await {
            yielder.yield_(res.map_err(Into::into)).await;
        }
    })
}

pin_project_lite::pin_project! {
    pub(crate) struct Limit<S> {
        #[pin]
        inner: S,

        count: u64,
        limit: u64,
        exceeded: bool,
    }
}

pub(crate) trait StreamLimit {
    /// Fail the stream once more than `limit` bytes have passed through it
    fn limit(self, limit: u64) -> Limit<Self>
    where
        Self: Sized,
    {
        Limit {
            inner: self,
            count: 0,
            limit,
            exceeded: false,
        }
    }
}

impl<S> StreamLimit for S {}

impl<S, E> Stream for Limit<S>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: From<LimitError>,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        if *this.exceeded {
            return Poll::Ready(None);
        }

        let limit = *this.limit;
        let count = this.count;

        this.inner.poll_next(cx).map(|opt| {
            opt.map(|res| match res {
                Ok(bytes) => {
                    *count += bytes.len() as u64;

                    if *count > limit {
                        *this.exceeded = true;
                        Err(E::from(LimitError { limit }))
                    } else {
                        Ok(bytes)
                    }
                }
                Err(e) => Err(e),
            })
        })
    }
}
