use std::sync::OnceLock;
use std::time::Instant;

/// Raw event record for one in-flight request.
///
/// Each slot holds the instant a transport lifecycle event was first
/// observed. Slots are write-once: marking an event that already has a
/// timestamp is a no-op, so a transport retrying connect attempts (or a
/// hook firing twice) can never move an earlier mark. The timeline is
/// owned by the cycle that issued the request and is only read after the
/// response body has been fully collected.
#[derive(Debug)]
pub struct Timeline {
    created: Instant,
    conn_requested: OnceLock<Instant>,
    dns_start: OnceLock<Instant>,
    dns_done: OnceLock<Instant>,
    connect_start: OnceLock<Instant>,
    connect_done: OnceLock<Instant>,
    tls_start: OnceLock<Instant>,
    tls_done: OnceLock<Instant>,
    conn_acquired: OnceLock<Instant>,
    first_byte: OnceLock<Instant>,
    response_done: OnceLock<Instant>,
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            created: Instant::now(),
            conn_requested: OnceLock::new(),
            dns_start: OnceLock::new(),
            dns_done: OnceLock::new(),
            connect_start: OnceLock::new(),
            connect_done: OnceLock::new(),
            tls_start: OnceLock::new(),
            tls_done: OnceLock::new(),
            conn_acquired: OnceLock::new(),
            first_byte: OnceLock::new(),
            response_done: OnceLock::new(),
        }
    }

    pub fn mark_conn_requested(&self) {
        self.record("conn-requested", &self.conn_requested);
    }

    pub fn mark_dns_start(&self) {
        self.record("dns-start", &self.dns_start);
    }

    pub fn mark_dns_done(&self) {
        self.record("dns-done", &self.dns_done);
    }

    /// May be called once per address attempt; only the first attempt is
    /// kept.
    pub fn mark_connect_start(&self) {
        self.record("connect-start", &self.connect_start);
    }

    pub fn mark_connect_done(&self) {
        self.record("connect-done", &self.connect_done);
    }

    pub fn mark_tls_start(&self) {
        self.record("tls-start", &self.tls_start);
    }

    pub fn mark_tls_done(&self) {
        self.record("tls-done", &self.tls_done);
    }

    pub fn mark_conn_acquired(&self) {
        self.record("conn-acquired", &self.conn_acquired);
    }

    pub fn mark_first_byte(&self) {
        self.record("first-byte", &self.first_byte);
    }

    pub fn mark_response_done(&self) {
        self.record("response-done", &self.response_done);
    }

    pub fn conn_requested(&self) -> Option<Instant> {
        self.conn_requested.get().copied()
    }

    pub fn dns_start(&self) -> Option<Instant> {
        self.dns_start.get().copied()
    }

    pub fn dns_done(&self) -> Option<Instant> {
        self.dns_done.get().copied()
    }

    pub fn connect_start(&self) -> Option<Instant> {
        self.connect_start.get().copied()
    }

    pub fn connect_done(&self) -> Option<Instant> {
        self.connect_done.get().copied()
    }

    pub fn tls_start(&self) -> Option<Instant> {
        self.tls_start.get().copied()
    }

    pub fn tls_done(&self) -> Option<Instant> {
        self.tls_done.get().copied()
    }

    pub fn conn_acquired(&self) -> Option<Instant> {
        self.conn_acquired.get().copied()
    }

    pub fn first_byte(&self) -> Option<Instant> {
        self.first_byte.get().copied()
    }

    pub fn response_done(&self) -> Option<Instant> {
        self.response_done.get().copied()
    }

    fn record(&self, event: &'static str, slot: &OnceLock<Instant>) {
        let now = Instant::now();
        if slot.set(now).is_ok() {
            trace!("event {} at +{:?}", event, now.duration_since(self.created));
        }
    }
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct TimelineOffsets {
    pub conn_requested: Option<u64>,
    pub dns_start: Option<u64>,
    pub dns_done: Option<u64>,
    pub connect_start: Option<u64>,
    pub connect_done: Option<u64>,
    pub tls_start: Option<u64>,
    pub tls_done: Option<u64>,
    pub conn_acquired: Option<u64>,
    pub first_byte: Option<u64>,
    pub response_done: Option<u64>,
}

#[cfg(test)]
impl Timeline {
    /// Builds a timeline whose events sit at the given microsecond offsets
    /// from a common origin.
    pub(crate) fn from_offsets(offsets: TimelineOffsets) -> Self {
        fn set(base: Instant, slot: &OnceLock<Instant>, at: Option<u64>) {
            if let Some(us) = at {
                let _ = slot.set(base + std::time::Duration::from_micros(us));
            }
        }

        let timeline = Self::new();
        let base = timeline.created;
        set(base, &timeline.conn_requested, offsets.conn_requested);
        set(base, &timeline.dns_start, offsets.dns_start);
        set(base, &timeline.dns_done, offsets.dns_done);
        set(base, &timeline.connect_start, offsets.connect_start);
        set(base, &timeline.connect_done, offsets.connect_done);
        set(base, &timeline.tls_start, offsets.tls_start);
        set(base, &timeline.tls_done, offsets.tls_done);
        set(base, &timeline.conn_acquired, offsets.conn_acquired);
        set(base, &timeline.first_byte, offsets.first_byte);
        set(base, &timeline.response_done, offsets.response_done);
        timeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn marking_twice_keeps_the_first_timestamp() {
        let timeline = Timeline::new();
        timeline.mark_dns_start();
        let first = timeline.dns_start().expect("first mark is recorded");

        std::thread::sleep(Duration::from_millis(2));
        timeline.mark_dns_start();
        assert_eq!(timeline.dns_start(), Some(first));
    }

    #[test]
    fn repeated_connect_attempts_keep_the_first_attempt() {
        let timeline = Timeline::new();
        timeline.mark_connect_start();
        let first = timeline.connect_start().expect("first attempt is recorded");

        for _ in 0..3 {
            std::thread::sleep(Duration::from_millis(1));
            timeline.mark_connect_start();
        }
        assert_eq!(timeline.connect_start(), Some(first));
    }

    #[test]
    fn unmarked_events_stay_unset() {
        let timeline = Timeline::new();
        timeline.mark_conn_requested();
        timeline.mark_dns_start();

        assert!(timeline.dns_done().is_none());
        assert!(timeline.tls_start().is_none());
        assert!(timeline.response_done().is_none());
    }

    #[test]
    fn completed_timeline_preserves_event_order() {
        let timeline = Timeline::new();
        timeline.mark_conn_requested();
        timeline.mark_dns_start();
        timeline.mark_dns_done();
        timeline.mark_connect_start();
        timeline.mark_connect_done();
        timeline.mark_tls_start();
        timeline.mark_tls_done();
        timeline.mark_conn_acquired();
        timeline.mark_first_byte();
        timeline.mark_response_done();

        let order = [
            timeline.conn_requested().unwrap(),
            timeline.dns_start().unwrap(),
            timeline.dns_done().unwrap(),
            timeline.connect_start().unwrap(),
            timeline.connect_done().unwrap(),
            timeline.tls_start().unwrap(),
            timeline.tls_done().unwrap(),
            timeline.conn_acquired().unwrap(),
            timeline.first_byte().unwrap(),
            timeline.response_done().unwrap(),
        ];
        assert!(order.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
