mod contender;
mod event_handler;
mod service;

pub use contender::*;
pub use event_handler::*;
pub use service::*;
