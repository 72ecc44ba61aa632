// ABOUTME: Reusable Server-Sent Events infrastructure: connection tracking and stream helpers
// ABOUTME: adapted from packages/api/src/sse.rs for the broker's single `/sse` MCP channel

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

const DEFAULT_MAX_SSE_CONNECTIONS_PER_IP: usize = 3;

#[derive(Debug)]
pub struct SseConnectionLimitExceeded;

#[derive(Clone)]
pub struct SseConnectionTracker {
    connections: Arc<Mutex<HashMap<IpAddr, usize>>>,
    max_connections_per_ip: usize,
}

impl Default for SseConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SseConnectionTracker {
    pub fn new() -> Self {
        let max_connections_per_ip = std::env::var("BROKER_SSE_MAX_CONNECTIONS_PER_IP")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&v| v > 0 && v <= 100)
            .unwrap_or(DEFAULT_MAX_SSE_CONNECTIONS_PER_IP);

        Self {
            connections: Arc::new(Mutex::new(HashMap::new())),
            max_connections_per_ip,
        }
    }

    pub fn try_acquire(
        &self,
        ip: IpAddr,
    ) -> Result<SseConnectionGuard, SseConnectionLimitExceeded> {
        let mut connections = self.connections.lock().unwrap_or_else(|poisoned| {
            warn!(audit = true, "SSE connection tracker mutex poisoned, recovering");
            poisoned.into_inner()
        });
        let count = connections.entry(ip).or_insert(0);

        if *count >= self.max_connections_per_ip {
            warn!(
                ip = %ip,
                current = %count,
                max = self.max_connections_per_ip,
                audit = true,
                "SSE connection limit exceeded"
            );
            return Err(SseConnectionLimitExceeded);
        }

        *count += 1;
        info!(ip = %ip, count = %count, max = self.max_connections_per_ip, "SSE connection acquired");

        Ok(SseConnectionGuard {
            ip,
            tracker: self.clone(),
        })
    }

    fn release(&self, ip: IpAddr) {
        let mut connections = self.connections.lock().unwrap_or_else(|poisoned| {
            warn!(audit = true, "SSE connection tracker mutex poisoned, recovering");
            poisoned.into_inner()
        });
        if let Some(count) = connections.get_mut(&ip) {
            *count = count.saturating_sub(1);
            info!(ip = %ip, remaining = %count, "SSE connection released");
            if *count == 0 {
                connections.remove(&ip);
            }
        }
    }
}

pub struct SseConnectionGuard {
    ip: IpAddr,
    tracker: SseConnectionTracker,
}

impl Drop for SseConnectionGuard {
    fn drop(&mut self) {
        self.tracker.release(self.ip);
    }
}

/// Wrapper that guarantees both the connection guard and an arbitrary
/// on-disconnect hook run when the stream is dropped, even if the client
/// disconnects mid-stream without a clean close.
pub struct GuardedSseStream<S> {
    stream: std::pin::Pin<Box<S>>,
    _guard: SseConnectionGuard,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl<S> GuardedSseStream<S> {
    pub fn new(stream: S, guard: SseConnectionGuard, on_drop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            stream: Box::pin(stream),
            _guard: guard,
            on_drop: Some(Box::new(on_drop)),
        }
    }
}

impl<S> Drop for GuardedSseStream<S> {
    fn drop(&mut self) {
        if let Some(hook) = self.on_drop.take() {
            hook();
        }
    }
}

impl<S, T, E> Stream for GuardedSseStream<S>
where
    S: Stream<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.stream.as_mut().poll_next(cx)
    }
}

pub fn create_sse_response<S>(stream: S) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(15))
            .text("keep-alive"),
    )
}

pub fn create_sse_event<T: serde::Serialize>(
    event_type: &str,
    data: &T,
) -> Result<Event, serde_json::Error> {
    let json_data = serde_json::to_string(data)?;
    Ok(Event::default().event(event_type).data(json_data))
}
