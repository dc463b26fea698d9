//! Shared fixtures for client integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use statline_common::resilience::{Clock, MockClock, RetryConfig};
use statline_domain::{ClientConfig, RequestDescriptor};
use statline_infra::{MemorySink, RawResponse, ResilientClient, Transport, TransportError};

pub type Scripted = Result<RawResponse, TransportError>;

/// Transport that replays a fixed script of responses.
///
/// Each send pops the next entry; an exhausted script answers `500`. The
/// mock clock is advanced by `latency` per call so telemetry sees a
/// non-zero duration.
#[derive(Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<RequestDescriptor>>>,
    calls: Arc<AtomicUsize>,
    clock: Option<MockClock>,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Scripted>,
    {
        Self {
            script: Arc::new(Mutex::new(script.into_iter().collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            clock: None,
            latency: Duration::ZERO,
        }
    }

    /// Advance `clock` by `latency` on every send.
    pub fn with_latency(mut self, clock: &MockClock, latency: Duration) -> Self {
        self.clock = Some(clock.clone());
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().clone()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if let Some(clock) = &self.clock {
            clock.advance(self.latency);
        }
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(RawResponse::new(500, "script exhausted")))
    }
}

pub fn ok(body: &str) -> Scripted {
    Ok(RawResponse::new(200, body))
}

pub fn status(code: u16) -> Scripted {
    Ok(RawResponse::new(code, ""))
}

/// Config with a test key and deterministic backoff.
pub fn config() -> ClientConfig {
    let mut config = ClientConfig::new("test-key");
    config.retry = RetryConfig::builder().no_jitter().build().unwrap();
    config
}

/// Everything a scenario needs to drive and inspect a client.
pub struct Harness {
    pub client: ResilientClient<MockClock>,
    pub transport: ScriptedTransport,
    pub sink: Arc<MemorySink>,
    pub clock: MockClock,
}

impl Harness {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Scripted>,
    {
        Self::with_config(config(), script)
    }

    pub fn with_config<I>(config: ClientConfig, script: I) -> Self
    where
        I: IntoIterator<Item = Scripted>,
    {
        let clock = MockClock::new().with_wall_time(Duration::from_secs(1_760_000_000));
        let transport =
            ScriptedTransport::new(script).with_latency(&clock, Duration::from_millis(120));
        let sink = Arc::new(MemorySink::new());
        let client = ResilientClient::builder(config)
            .transport(transport.clone())
            .telemetry(sink.clone())
            .clock(clock.clone())
            .build()
            .unwrap();

        Self { client, transport, sink, clock }
    }

    /// Sleeps taken by retry backoff, excluding the configured throttle.
    pub fn retry_sleeps(&self) -> Vec<Duration> {
        let throttle = self.client.config().rate_limit.min_interval;
        self.clock.sleeps().into_iter().filter(|d| *d > throttle).collect()
    }

    pub fn now(&self) -> std::time::Instant {
        self.clock.now()
    }
}
