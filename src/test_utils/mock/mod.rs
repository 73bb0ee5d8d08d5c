//! Test doubles for isolating the election service.
//!
//! - [`RecordingContender`] records every callback in arrival order and
//!   tracks how many sessions it was told to treat as current.
//! - [`ScriptedDriver`] lets a test inject raw driver notifications and
//!   observe (or fail, or delay) leader information writes.
//!
//! For interaction checks the `MockElectionDriver` generated by [mockall] is
//! used directly.
//!
//! [mockall]: https://docs.rs/mockall/latest/mockall/

mod mock_driver;

pub use mock_contender::*;
pub use mock_driver::*;
