//! Typed multicast delegates for single-threaded event dispatch.
//!
//! A [`Delegate`] is an ordered list of subscriber callbacks fired together
//! by [`broadcast`](Delegate::broadcast). Subscribers live behind
//! [`Rc`](std::rc::Rc), bindings come in strong and weak flavors, and
//! per-slot passing modes ([`Val`], [`Ref`], [`Mut`], [`Handoff`]) decide
//! what each handler receives. Handlers may add and remove bindings,
//! including their own, while a broadcast is in flight.
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use multidelegate::{Delegate, Val};
//!
//! struct Score {
//!     total: Cell<i32>,
//! }
//!
//! fn on_points(score: &Score, points: i32) {
//!     score.total.set(score.total.get() + points);
//! }
//!
//! let on_scored: Delegate<Val<i32>> = Delegate::new();
//! let score = Rc::new(Score { total: Cell::new(0) });
//!
//! on_scored.add_strong(&score, on_points);
//! on_scored.broadcast(&mut Val(10));
//! on_scored.broadcast(&mut Val(5));
//!
//! assert_eq!(score.total.get(), 15);
//! ```

pub mod args;
mod binding;
pub mod delegate;
pub mod listener;

pub use args::{Args, Handler, Handoff, Mut, Param, Ref, Val};
pub use delegate::Delegate;
pub use listener::Listener;
