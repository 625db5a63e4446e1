//! Coordination primitives shared between the transport's delivery context and the
//! connection's callers.
//!
//! - [`TurnPermit`]: a binary ownership token with suspending acquire
//! - [`AsyncQueue`]: an unbounded FIFO whose dequeue yields a tagged [`Slot`]

mod async_queue;
mod turn_permit;

pub use async_queue::AsyncQueue;
pub use async_queue::Slot;
pub use turn_permit::TurnPermit;
