pub mod error;
pub mod queue_item;

pub use error::HandlerError;
pub use queue_item::QueueItemHandler;
