use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

pub const OUTCOME_ACCEPTED: &str = "accepted";
pub const OUTCOME_REJECTED: &str = "rejected";

/// Per-process counters for extauth decisions. Operator-facing only.
#[derive(Clone)]
pub struct AuthMetrics {
    registry: Registry,
    requests: IntCounterVec,
    rejections: IntCounterVec,
}

impl AuthMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new(
                "ejabberd_auth_requests_total",
                "Count of extauth requests grouped by command and outcome",
            ),
            &["command", "outcome"],
        )?;
        registry.register(Box::new(requests.clone()))?;

        let rejections = IntCounterVec::new(
            Opts::new(
                "ejabberd_auth_rejections_total",
                "Count of rejected auth requests grouped by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(rejections.clone()))?;

        Ok(Self {
            registry,
            requests,
            rejections,
        })
    }

    pub fn request(&self, command: &str, accepted: bool) {
        let outcome = if accepted {
            OUTCOME_ACCEPTED
        } else {
            OUTCOME_REJECTED
        };
        self.requests.with_label_values(&[command, outcome]).inc();
    }

    pub fn rejection(&self, reason: &str) {
        self.rejections.with_label_values(&[reason]).inc();
    }

    pub fn requests_total(&self, command: &str, outcome: &str) -> u64 {
        self.requests.with_label_values(&[command, outcome]).get()
    }

    pub fn rejections_total(&self, reason: &str) -> u64 {
        self.rejections.with_label_values(&[reason]).get()
    }

    /// Prometheus text exposition of every counter.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
