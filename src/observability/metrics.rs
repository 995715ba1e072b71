use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub transitions_total: IntCounterVec,
    pub events_published_total: IntCounterVec,
    pub audit_failures_total: IntCounter,
    pub side_effects_in_queue: IntGauge,
    pub side_effects_dropped_total: IntCounter,
    pub realtime_sessions: IntGauge,
    pub location_updates_total: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new(
                "transitions_total",
                "Status transition attempts by path or error kind",
            ),
            &["outcome"],
        )
        .expect("valid transitions_total metric");

        let events_published_total = IntCounterVec::new(
            Opts::new("events_published_total", "Order events published by kind"),
            &["kind"],
        )
        .expect("valid events_published_total metric");

        let audit_failures_total =
            IntCounter::new("audit_failures_total", "Audit entries the sink rejected")
                .expect("valid audit_failures_total metric");

        let side_effects_in_queue = IntGauge::new(
            "side_effects_in_queue",
            "Committed mutations waiting for audit and publication",
        )
        .expect("valid side_effects_in_queue metric");

        let side_effects_dropped_total = IntCounter::new(
            "side_effects_dropped_total",
            "Committed mutations whose audit entry and event were dropped",
        )
        .expect("valid side_effects_dropped_total metric");

        let realtime_sessions =
            IntGauge::new("realtime_sessions", "Currently connected realtime sessions")
                .expect("valid realtime_sessions metric");

        let location_updates_total = IntCounter::new(
            "location_updates_total",
            "Courier position pings relayed to sessions",
        )
        .expect("valid location_updates_total metric");

        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(events_published_total.clone()))
            .expect("register events_published_total");
        registry
            .register(Box::new(audit_failures_total.clone()))
            .expect("register audit_failures_total");
        registry
            .register(Box::new(side_effects_in_queue.clone()))
            .expect("register side_effects_in_queue");
        registry
            .register(Box::new(side_effects_dropped_total.clone()))
            .expect("register side_effects_dropped_total");
        registry
            .register(Box::new(realtime_sessions.clone()))
            .expect("register realtime_sessions");
        registry
            .register(Box::new(location_updates_total.clone()))
            .expect("register location_updates_total");

        Self {
            registry,
            transitions_total,
            events_published_total,
            audit_failures_total,
            side_effects_in_queue,
            side_effects_dropped_total,
            realtime_sessions,
            location_updates_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
