//! Engine events: what was committed, wrapped for publication.
//!
//! Both engines publish the events of a committed transaction so that
//! collaborators (kitchen display, purchase module, dashboards) can react
//! without polling the books. Publication happens strictly after commit.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
