use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use futures_util::future;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub type EventStream = Sse<KeepAliveStream<BoxStream<'static, Result<Event, Infallible>>>>;

pub fn json_event<T: Serialize>(name: &str, payload: &T) -> Option<Event> {
    match Event::default().event(name).json_data(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::error!("Failed to encode {} event: {}", name, e);
            None
        }
    }
}

/// What to emit for one observed value.
pub enum Emit {
    Skip,
    Event(Event),
    /// Emit and close the stream.
    Last(Event),
}

/// Streams every value a watch channel takes, starting with the current one.
///
/// `guard` is owned by the stream, so whatever it holds (a mounted notifier,
/// a presence membership) lives exactly as long as the client stays connected.
pub fn watch_events<T, G, F>(rx: watch::Receiver<T>, guard: G, render: F) -> EventStream
where
    T: Clone + Send + Sync + 'static,
    G: Send + 'static,
    F: Fn(&T) -> Emit + Send + 'static,
{
    let stream = WatchStream::new(rx)
        .flat_map(move |value| {
            let _held = &guard;
            // `None` marks the end of the stream.
            let frames = match render(&value) {
                Emit::Skip => vec![],
                Emit::Event(event) => vec![Some(event)],
                Emit::Last(event) => vec![Some(event), None],
            };
            stream::iter(frames)
        })
        .take_while(|frame| future::ready(frame.is_some()))
        .filter_map(future::ready)
        .map(Ok::<_, Infallible>);

    Sse::new(stream.boxed()).keep_alive(KeepAlive::default())
}
