pub mod aggregator;
pub mod clock;
pub mod dedup;
pub mod detector;
pub mod locker;
pub mod monitor;
