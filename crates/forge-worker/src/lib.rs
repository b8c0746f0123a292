pub mod dispatcher;
pub mod publisher;

pub use dispatcher::{FailurePolicy, PostDispatcher, TickReport};
pub use publisher::{LogPublisher, PublishError, Publisher};
