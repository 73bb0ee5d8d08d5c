mod memory_driver;
mod memory_store;

pub use memory_driver::*;
pub use memory_store::*;
