use crate::{
    Error, Pacer, ResponseHead, ResponseSink, Result, SessionOutcome, SessionState,
    StreamParams, StreamSession, TokioScheduler, make_chunk,
};
use bytes::Bytes;
use core::time::Duration;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Event {
    Head(ResponseHead),
    Flush { data: Bytes, at: Duration },
    Finish { data: Bytes, at: Duration },
}

/// Records every call a session makes, with the time it was made.
struct MockSink {
    events: Arc<Mutex<Vec<Event>>>,
    origin: Instant,
    /// Per-chunk transport latency, indexed by chunk number. Missing entries
    /// mean an immediate acknowledgement.
    delays: Vec<Duration>,
    /// 1-based chunk number whose flush fails.
    fail_on: Option<usize>,
    dispatched: usize,
}

impl MockSink {
    fn new() -> (Self, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Self {
            events: Arc::clone(&events),
            origin: Instant::now(),
            delays: Vec::new(),
            fail_on: None,
            dispatched: 0,
        };
        (sink, events)
    }

    fn with_delays(mut self, delays: &[u64]) -> Self {
        self.delays = delays.iter().copied().map(Duration::from_millis).collect();
        self
    }

    fn failing_on(mut self, chunk: usize) -> Self {
        self.fail_on = Some(chunk);
        self
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    async fn deliver(&mut self) -> Result<()> {
        let delay = self
            .delays
            .get(self.dispatched - 1)
            .copied()
            .unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on == Some(self.dispatched) {
            return Err(Error::Transport {
                context: "connection reset by peer".to_string(),
            });
        }
        Ok(())
    }
}

impl ResponseSink for MockSink {
    fn write_head(&mut self, head: ResponseHead) -> Result<()> {
        self.push(Event::Head(head));
        Ok(())
    }

    async fn flush(&mut self, chunk: Bytes) -> Result<()> {
        self.dispatched += 1;
        self.push(Event::Flush {
            data: chunk,
            at: self.origin.elapsed(),
        });
        self.deliver().await
    }

    async fn finish(&mut self, last: Bytes) -> Result<()> {
        self.dispatched += 1;
        self.push(Event::Finish {
            data: last,
            at: self.origin.elapsed(),
        });
        self.deliver().await
    }
}

fn params(chunk_size: usize, chunk_count: usize) -> StreamParams {
    StreamParams {
        chunk_size,
        chunk_count,
    }
}

fn dispatch_times(events: &[Event]) -> Vec<Duration> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Head(_) => None,
            Event::Flush { at, .. } | Event::Finish { at, .. } => Some(*at),
        })
        .collect()
}

#[track_caller]
fn assert_near(actual: Duration, expected_ms: u64) {
    let expected = Duration::from_millis(expected_ms);
    assert!(
        actual >= expected && actual <= expected + Duration::from_millis(5),
        "dispatched at {actual:?}, expected ~{expected:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn streams_exactly_count_chunks_then_finalizes_once() {
    let (sink, events) = MockSink::new();
    let mut session = StreamSession::new(params(10, 5), sink, TokioScheduler);
    assert_eq!(session.chunk_size(), 10);
    assert!(!session.state().is_terminal());

    let outcome = session.run().await;

    assert_eq!(
        outcome,
        SessionOutcome::Completed {
            chunks: 5,
            bytes: 50
        }
    );
    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.state().is_terminal());
    assert_eq!(session.remaining_chunks(), 0);
    assert_eq!(session.sink().dispatched, 5);

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 6);
    assert!(matches!(&events[0], Event::Head(head) if head.server == "trickle"));
    for event in &events[1..5] {
        assert!(matches!(event, Event::Flush { data, .. } if &data[..] == b"123456789_"));
    }
    assert!(matches!(&events[5], Event::Finish { data, .. } if &data[..] == b"123456789_"));
}

#[tokio::test(start_paused = true)]
async fn single_chunk_goes_straight_to_finish() {
    let (sink, events) = MockSink::new();
    let mut session = StreamSession::new(params(25, 1), sink, TokioScheduler);

    let start = Instant::now();
    let outcome = session.run().await;

    assert_eq!(
        outcome,
        SessionOutcome::Completed {
            chunks: 1,
            bytes: 25
        }
    );
    // No pacing decision is made for the last chunk.
    assert_eq!(start.elapsed(), Duration::ZERO);

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], Event::Head(_)));
    assert!(matches!(&events[1], Event::Finish { data, .. } if *data == make_chunk(25)));
}

#[tokio::test(start_paused = true)]
async fn fast_transport_is_paced_to_the_interval() {
    let (sink, events) = MockSink::new();
    let mut session = StreamSession::new(params(4, 4), sink, TokioScheduler);

    session.run().await;

    let times = dispatch_times(&events.lock().unwrap());
    assert_eq!(times.len(), 4);
    for (i, at) in times.into_iter().enumerate() {
        assert_near(at, 1000 * i as u64);
    }
}

#[tokio::test(start_paused = true)]
async fn partial_latency_is_subtracted_from_the_delay() {
    let (sink, events) = MockSink::new();
    let sink = sink.with_delays(&[300, 700]);
    let mut session = StreamSession::new(params(4, 3), sink, TokioScheduler);

    session.run().await;

    let times = dispatch_times(&events.lock().unwrap());
    assert_near(times[0], 0);
    assert_near(times[1], 1000);
    assert_near(times[2], 2000);
}

#[tokio::test(start_paused = true)]
async fn slow_iterations_continue_immediately_without_catch_up() {
    let (sink, events) = MockSink::new();
    // Chunk 1 overruns the interval, chunk 2 is quick again.
    let sink = sink.with_delays(&[1500, 200]);
    let mut session = StreamSession::new(params(4, 3), sink, TokioScheduler);

    session.run().await;

    let times = dispatch_times(&events.lock().unwrap());
    assert_near(times[0], 0);
    // Sent as soon as chunk 1 was acknowledged.
    assert_near(times[1], 1500);
    // Anchored to chunk 2's dispatch, not to a 0/1000/2000 schedule.
    assert_near(times[2], 2500);
}

#[tokio::test(start_paused = true)]
async fn custom_interval() {
    let (sink, events) = MockSink::new();
    let mut session = StreamSession::new(params(1, 3), sink, TokioScheduler)
        .with_pacer(Pacer::new(Duration::from_millis(250)));

    session.run().await;

    let times = dispatch_times(&events.lock().unwrap());
    assert_near(times[1], 250);
    assert_near(times[2], 500);
}

#[tokio::test(start_paused = true)]
async fn flush_error_stops_the_stream_without_finalizing() {
    let (sink, events) = MockSink::new();
    let sink = sink.failing_on(3);
    let mut session = StreamSession::new(params(10, 10), sink, TokioScheduler);

    let outcome = session.run().await;

    assert!(matches!(
        outcome,
        SessionOutcome::Failed(Error::Transport { .. })
    ));
    assert_eq!(session.state(), SessionState::Failed);
    // Two flushes were acknowledged; the failed one does not count.
    assert_eq!(session.remaining_chunks(), 8);
    assert_eq!(session.stats().chunks_sent, 2);

    let events = events.lock().unwrap();
    let flushes = events
        .iter()
        .filter(|e| matches!(e, Event::Flush { .. }))
        .count();
    assert_eq!(flushes, 3);
    assert!(!events.iter().any(|e| matches!(e, Event::Finish { .. })));
}

#[tokio::test(start_paused = true)]
async fn failure_on_the_last_chunk_is_reported() {
    let (sink, _events) = MockSink::new();
    let sink = sink.failing_on(2);
    let mut session = StreamSession::new(params(10, 2), sink, TokioScheduler);

    let outcome = session.run().await;

    assert!(matches!(outcome, SessionOutcome::Failed(_)));
    assert_eq!(session.remaining_chunks(), 1);
}

#[tokio::test(start_paused = true)]
async fn remaining_chunks_track_acknowledged_flushes() {
    let token = CancellationToken::new();
    let (sink, events) = MockSink::new();
    let mut session = StreamSession::new(params(8, 20), sink, TokioScheduler)
        .with_cancellation(token.clone());

    let handle = tokio::spawn(async move {
        let outcome = session.run().await;
        (outcome, session.remaining_chunks(), session.state())
    });

    // Chunks go out at 0, 1000, 2000; cancel while waiting on the next timer.
    tokio::time::sleep(Duration::from_millis(2500)).await;
    token.cancel();

    let (outcome, remaining, state) = handle.await.unwrap();
    assert_eq!(outcome, SessionOutcome::Cancelled);
    assert_eq!(remaining, 20 - 3);
    assert_eq!(state, SessionState::Failed);

    let events = events.lock().unwrap();
    assert_eq!(dispatch_times(&events).len(), 3);
    assert!(!events.iter().any(|e| matches!(e, Event::Finish { .. })));
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_a_pending_flush_does_not_count_the_chunk() {
    let token = CancellationToken::new();
    let (sink, _events) = MockSink::new();
    let sink = sink.with_delays(&[0, 5000]);
    let mut session = StreamSession::new(params(8, 5), sink, TokioScheduler)
        .with_cancellation(token.clone());

    let handle = tokio::spawn(async move {
        let outcome = session.run().await;
        (outcome, session.remaining_chunks())
    });

    tokio::time::sleep(Duration::from_millis(2000)).await;
    token.cancel();

    let (outcome, remaining) = handle.await.unwrap();
    assert_eq!(outcome, SessionOutcome::Cancelled);
    assert_eq!(remaining, 4);
}

#[tokio::test(start_paused = true)]
async fn cancelled_before_start_writes_nothing() {
    let token = CancellationToken::new();
    token.cancel();
    let (sink, events) = MockSink::new();
    let mut session =
        StreamSession::new(params(8, 5), sink, TokioScheduler).with_cancellation(token);

    assert_eq!(session.run().await, SessionOutcome::Cancelled);
    assert!(events.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn running_a_finished_session_is_a_no_op() {
    let (sink, events) = MockSink::new();
    let mut session = StreamSession::new(params(3, 2), sink, TokioScheduler);

    let first = session.run().await;
    let recorded = events.lock().unwrap().len();
    let second = session.run().await;

    assert_eq!(first, second);
    assert_eq!(events.lock().unwrap().len(), recorded);
}

#[tokio::test(start_paused = true)]
async fn server_name_is_used_in_the_head() {
    let (sink, events) = MockSink::new();
    let mut session =
        StreamSession::new(params(3, 1), sink, TokioScheduler).with_server_name("RESTinio");

    session.run().await;

    let events = events.lock().unwrap();
    match &events[0] {
        Event::Head(head) => {
            assert_eq!(head.server, "RESTinio");
            assert_eq!(head.content_type, "text/plain; charset=utf-8");
        }
        other => panic!("expected head first, got {other:?}"),
    }
}

#[tokio::test]
async fn immediate_continuations_yield_to_other_tasks() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let stop = Arc::new(AtomicBool::new(false));

    let ticker = {
        let ticks = Arc::clone(&ticks);
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            while !stop.load(Ordering::Relaxed) {
                ticks.fetch_add(1, Ordering::Relaxed);
                tokio::task::yield_now().await;
            }
        })
    };

    let (sink, _events) = MockSink::new();
    let mut session = StreamSession::new(params(1, 20_000), sink, TokioScheduler)
        .with_pacer(Pacer::new(Duration::ZERO));

    let outcome = session.run().await;
    stop.store(true, Ordering::Relaxed);
    ticker.await.unwrap();

    assert_eq!(
        outcome,
        SessionOutcome::Completed {
            chunks: 20_000,
            bytes: 20_000
        }
    );
    // The mock sink never suspends, so every tick happened during a yield.
    assert!(ticks.load(Ordering::Relaxed) > 1000);
}
