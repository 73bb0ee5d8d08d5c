mod leader_information;
mod session_id;

pub use leader_information::*;
pub use session_id::*;
