//! # Event subscribers.
//!
//! ```text
//! control loop ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit
//!                                                            ├──► LogWriter
//!                                                            ├──► metrics
//!                                                            └──► custom ...
//! ```
//!
//! Implement [`Subscribe`] and pass it to
//! [`SupervisorBuilder::with_subscribers`](crate::SupervisorBuilder::with_subscribers).

#[cfg(feature = "logging")]
mod embedded;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use embedded::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
