pub mod config;
pub mod error;
pub mod kernel;
pub mod services;

pub use kernel::reactor::Reactor;
pub use kernel::trigger::TriggerHandle;
