use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tracing::error;


lazy_static! {
    pub static ref LEADERSHIP_GRANTED_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("leadership_granted", "Leadership grants delivered to the contender"),
        &["resource"]
    )
    .expect("metric can not be created");

    pub static ref LEADERSHIP_REVOKED_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("leadership_revoked", "Leadership revokes delivered to the contender"),
        &["resource"]
    )
    .expect("metric can not be created");

    pub static ref LEADERSHIP_CONFIRMED_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("leadership_confirmed", "Confirmations written to the coordination backend"),
        &["resource"]
    )
    .expect("metric can not be created");

    pub static ref FENCED_CONFIRMATION_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("fenced_confirmation", "Confirmations discarded for carrying a stale session id"),
        &["resource"]
    )
    .expect("metric can not be created");

    pub static ref DRIVER_WRITE_FAILURE_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("driver_write_failure", "Failed or timed out leader information writes"),
        &["resource"]
    )
    .expect("metric can not be created");

    pub static ref SUPPRESSED_DRIVER_EVENT_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("suppressed_driver_event", "Duplicate driver notifications dropped by the event handler"),
        &["resource"]
    )
    .expect("metric can not be created");

    pub static ref LEADER_INFORMATION_MISMATCH_METRIC: IntCounterVec = IntCounterVec::new(
        Opts::new("leader_information_mismatch", "Stored leader records diverging from the confirmed one"),
        &["resource"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER_ONCE: Once = Once::new();

pub fn register_custom_metrics(registry: &Registry) {
    let collectors = [
        &*LEADERSHIP_GRANTED_METRIC,
        &*LEADERSHIP_REVOKED_METRIC,
        &*LEADERSHIP_CONFIRMED_METRIC,
        &*FENCED_CONFIRMATION_METRIC,
        &*DRIVER_WRITE_FAILURE_METRIC,
        &*SUPPRESSED_DRIVER_EVENT_METRIC,
        &*LEADER_INFORMATION_MISMATCH_METRIC,
    ];
    for c in collectors {
        if let Err(e) = registry.register(Box::new(c.clone())) {
            error!("collector can not be registered: {:?}", e);
        }
    }
}

/// Renders every election metric in the Prometheus text format.
pub fn gather_metrics() -> String {
    REGISTER_ONCE.call_once(|| register_custom_metrics(&REGISTRY));

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode election metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("election metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
