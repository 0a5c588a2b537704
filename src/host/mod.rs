//! Local host for the two entry points: a UTC-aligned sweep worker and a
//! watcher that turns store notifications into occupancy reconciliations.

pub mod schedule;
pub mod trigger;
pub mod worker;

pub use schedule::{delay_until_next_run, next_run_after};
pub use trigger::OccupancyTrigger;
pub use worker::{OccupancyWatcher, SweepWorker, spawn_occupancy_watcher, spawn_sweep_worker};
