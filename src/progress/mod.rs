pub mod aggregator;
pub mod channel;
pub mod events;

pub use aggregator::{Applied, ProgressAggregator, Snapshot};
pub use channel::{channel, CancelToken, ConsumerLink, Received, WorkerLink};
pub use events::{Event, EventKind};
