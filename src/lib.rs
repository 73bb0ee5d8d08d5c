//! Leader election coordination layer.
//!
//! One [`ElectionService`] per contended resource. The service owns an
//! [`ElectionDriver`] talking to the external coordination substrate, funnels
//! the driver's notifications through an [`ElectionEventHandler`] and hands
//! fenced leadership sessions to a [`Contender`].

mod config;
mod constants;
mod driver;
mod election;
mod errors;
mod leader;
mod metrics;

pub use config::*;
pub use constants::*;
pub use driver::*;
pub use election::*;
pub use errors::*;
pub use leader::*;
pub use metrics::*;

//-----------------------------------------------------------
// Test utils
