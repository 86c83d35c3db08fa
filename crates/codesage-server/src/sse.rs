//! 查询事件 → SSE

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use codesage_agent::QueryEvent;
use futures::stream::{Stream, StreamExt};

/// 每个事件一帧 `data: <json>`
pub fn query_events_to_sse<S>(stream: S) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = QueryEvent> + Send + 'static,
{
    let stream = stream.map(|event| Ok(Event::default().data(event.to_json())));
    Sse::new(stream).keep_alive(KeepAlive::default())
}
