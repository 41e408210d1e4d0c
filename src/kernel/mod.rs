pub mod cooldown;
pub mod event;
pub mod reactor;
pub mod resilience;
pub mod scheduler;
pub mod state;
pub mod telemetry;
pub mod time;
pub mod trigger;
pub mod verification;
