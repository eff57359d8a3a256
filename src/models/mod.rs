//! Domain models shared across the whole monitor.

pub mod alert;
pub mod bar;
pub mod feed;
pub mod range;

pub use alert::{AlertEvent, AlertKey, AlertRecord, AlertSeverity, FailureDirection};
pub use bar::Bar;
pub use feed::{DiscreteBarUpdate, FeedBar, FeedEvent, TickSnapshot};
pub use range::OpeningRange;
