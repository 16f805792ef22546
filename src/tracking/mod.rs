// Change tracking for a unit of work
pub mod change_tracker;
pub mod mutation;

pub use change_tracker::*;
pub use mutation::*;
