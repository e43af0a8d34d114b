//! Trait-based subscriptions with override-aware dispatch.

use crate::args::Args;

/// A subscriber that receives broadcasts through its own `impl`.
///
/// Typed handlers bound with [`add_strong`](crate::Delegate::add_strong) are
/// plain function pointers and always call exactly the function that was
/// bound. Binding through `Listener` instead routes each broadcast through
/// the trait object, so a delegate holding `Rc<dyn Listener<A>>` invokes the
/// most-derived implementation behind the pointer, whatever concrete type
/// that turns out to be.
pub trait Listener<A: Args> {
    /// Called once per broadcast this subscriber is bound to.
    fn on_broadcast(&self, args: A::Passed<'_>);
}
