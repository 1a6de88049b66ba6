//! Synchronization Primitives
//!
//! Small, explicitly constructed coordination values shared between the
//! writer, the dispatcher, and the dialogue surface host:
//!
//! - [`EventBus`]: a capturing publish/subscribe bus. An event can be marked
//!   for capture before the action that may fire it; if it fires before a
//!   waiter subscribes, the firing is stored and replayed to the first
//!   subsequent waiter instead of being lost.
//! - [`Gate`]: a reentrant lock map keyed by an external resource id, with an
//!   optional hit counter. Used to suppress externally sourced advance
//!   signals while a scripted reveal is driving the same widget.
//!
//! Both are cheaply clonable handles over shared state; there is no
//! process-wide singleton anywhere in this crate.

mod bus;
mod gate;

pub use bus::EventBus;
pub use gate::Gate;
