use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Extension,
};
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::{
    error::{ServiceError, ServiceResult},
    metrics::SSE_CONNECTIONS_ACTIVE,
    middlewares::auth::JwtClaims,
    models::timer::{TimeExpired, TimerEvent, TimerTick},
    services::{attempt_service::AttemptService, AppState},
};

/// GET /api/quiz-attempts/{id}/stream - Countdown for the owner's timed attempt
pub async fn attempt_stream(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(attempt_id): Path<String>,
) -> ServiceResult<impl IntoResponse> {
    let (attempt, remaining) = AttemptService::new(&state)
        .time_remaining(&claims, &attempt_id)
        .await?;

    if !attempt.is_in_progress() {
        return Err(ServiceError::conflict("Attempt already submitted"));
    }
    let (Some(deadline), Some(remaining)) = (attempt.deadline, remaining) else {
        return Err(ServiceError::validation("Attempt has no time limit"));
    };

    let total_seconds = (deadline - attempt.start_time).num_seconds().max(0) as u32;
    let remaining = remaining.clamp(0, i64::from(total_seconds)) as u32;
    let elapsed = total_seconds.saturating_sub(remaining);
    let max_ticks = max_stream_duration_seconds();

    tracing::info!(
        attempt_id = %attempt_id,
        user_id = %claims.sub,
        remaining,
        total_seconds,
        "Starting attempt timer stream"
    );

    let stream = create_timer_stream(
        attempt_id,
        elapsed,
        total_seconds,
        max_ticks,
        tick_interval_ms(),
    );
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn max_stream_duration_seconds() -> u32 {
    std::env::var("SSE_MAX_STREAM_SECONDS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(3 * 3600)
}

fn tick_interval_ms() -> u64 {
    std::env::var("SSE_TICK_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(1000)
}

/// Keeps the open-connection gauge honest however the stream ends
struct ConnectionGuard;

impl ConnectionGuard {
    fn open() -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        ConnectionGuard
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
    }
}

/// One `timer-tick` per interval from `elapsed` up to `total`, then a single `time-expired`.
/// After `max_ticks` ticks the stream closes without expiring; clients reconnect to resume.
fn create_timer_stream(
    attempt_id: String,
    elapsed: u32,
    total_seconds: u32,
    max_ticks: u32,
    tick_interval_ms: u64,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let guard = ConnectionGuard::open();
    timer_events(attempt_id, elapsed, total_seconds, max_ticks, tick_interval_ms).map(
        move |timer_event| {
            let _connection = &guard;
            Ok(Event::default()
                .event(timer_event.event_name())
                .data(timer_event.to_sse_data()))
        },
    )
}

fn timer_events(
    attempt_id: String,
    elapsed: u32,
    total_seconds: u32,
    max_ticks: u32,
    tick_interval_ms: u64,
) -> impl Stream<Item = TimerEvent> {
    stream::unfold(
        (attempt_id, elapsed, total_seconds, max_ticks, false),
        move |(id, elapsed, total, ticks_left, final_sent)| async move {
            if final_sent {
                return None;
            }

            if elapsed >= total {
                tracing::info!(attempt_id = %id, "Attempt timer expired");
                let expired_event = TimerEvent::TimeExpired(TimeExpired {
                    attempt_id: id.clone(),
                    timestamp: Utc::now(),
                    message: "Time limit exceeded".to_string(),
                });
                return Some((expired_event, (id, elapsed, total, ticks_left, true)));
            }

            if ticks_left == 0 {
                tracing::debug!(attempt_id = %id, "Attempt timer stream reached its maximum length");
                return None;
            }

            let tick_event = TimerEvent::TimerTick(TimerTick {
                attempt_id: id.clone(),
                remaining_seconds: total - elapsed,
                elapsed_seconds: elapsed,
                total_seconds: total,
                timestamp: Utc::now(),
            });

            sleep(Duration::from_millis(tick_interval_ms)).await;

            Some((tick_event, (id, elapsed + 1, total, ticks_left - 1, false)))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_ticks_then_expires_once() {
        let events: Vec<_> = create_timer_stream("a1".to_string(), 0, 3, 100, 1)
            .collect()
            .await;
        // three ticks and the expiry
        assert_eq!(events.len(), 4);
    }

    #[tokio::test]
    async fn resumed_stream_starts_from_elapsed() {
        let events: Vec<_> = timer_events("a1".to_string(), 2, 3, 100, 1).collect().await;
        assert_eq!(events.len(), 2);
        match &events[0] {
            TimerEvent::TimerTick(tick) => assert_eq!(tick.remaining_seconds, 1),
            other => panic!("expected a tick, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn expired_attempt_gets_only_the_final_event() {
        let events: Vec<_> = timer_events("a1".to_string(), 5, 5, 100, 1).collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_name(), "time-expired");
    }

    #[tokio::test]
    async fn long_attempt_is_capped_without_early_expiry() {
        // fresh 1440 minute attempt, stream capped at 3 ticks
        let total = 1440 * 60;
        let events: Vec<_> = timer_events("a1".to_string(), 0, total, 3, 1).collect().await;

        assert_eq!(events.len(), 3);
        for (i, event) in events.iter().enumerate() {
            match event {
                TimerEvent::TimerTick(tick) => {
                    assert_eq!(tick.elapsed_seconds, i as u32);
                    assert_eq!(tick.remaining_seconds, total - i as u32);
                    assert_eq!(tick.total_seconds, total);
                }
                TimerEvent::TimeExpired(_) => panic!("expired before the deadline"),
            }
        }
    }

    #[tokio::test]
    async fn cap_does_not_hide_a_real_expiry() {
        let events: Vec<_> = timer_events("a1".to_string(), 8, 10, 5, 1).collect().await;
        // two ticks then the expiry, inside the cap
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].event_name(), "time-expired");
    }
}
