use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// What a backend connectivity blip means for the local belief of leadership.
///
/// `AssumeLost` never lets two contenders believe they lead at once. A grace
/// period trades that for fewer spurious revokes and should not exceed the
/// backend's own session timeout.
///
/// ```toml
/// [connection_loss]
/// policy = "grace_period"
/// grace_period_ms = 500
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ConnectionLossPolicy {
    /// Treat a suspension as an immediate loss of leadership
    #[default]
    AssumeLost,

    /// Keep leadership unless the connection stays suspended for longer than the grace period
    GracePeriod { grace_period_ms: u64 },
}

impl ConnectionLossPolicy {
    pub fn grace_period(&self) -> Option<Duration> {
        match self {
            ConnectionLossPolicy::AssumeLost => None,
            ConnectionLossPolicy::GracePeriod { grace_period_ms } => Some(Duration::from_millis(*grace_period_ms)),
        }
    }

    pub(super) fn validate(&self) -> Result<()> {
        if let ConnectionLossPolicy::GracePeriod { grace_period_ms: 0 } = self {
            return Err(Error::Config(ConfigError::Message(
                "grace_period_ms must be greater than 0, use assume_lost instead".into(),
            )));
        }
        Ok(())
    }
}
