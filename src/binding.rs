//! Binding records shared between the registry and in-flight broadcasts.
//!
//! Every subscription is one [`BindingNode`] held behind `Rc`: the registry
//! lists hold one handle, and each running broadcast snapshot holds another.
//! Removal flips the node's `removed` flag, which both sides observe, so a
//! pull performed mid-broadcast takes effect for the pass that is already on
//! the stack without either side touching the other's list.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use crate::args::{Args, Handler};
use crate::listener::Listener;

/// Identity of a subscriber: the address of its shared allocation.
///
/// Strong and weak handles to the same subscriber produce the same key, and
/// the key stays comparable after the subscriber is dropped, so expired weak
/// bindings can still be matched for removal.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) struct OwnerKey(*const ());

impl OwnerKey {
    pub(crate) fn of_rc<S: ?Sized>(owner: &Rc<S>) -> Self {
        OwnerKey(Rc::as_ptr(owner).cast::<()>())
    }

    pub(crate) fn of_weak<S: ?Sized>(owner: &Weak<S>) -> Self {
        OwnerKey(Weak::as_ptr(owner).cast::<()>())
    }
}

/// Identity of the handler half of a binding.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum HandlerKey {
    /// Address of a typed handler function.
    Typed(usize),
    /// Listener-flavor binding; the owner's [`Listener`] impl is the handler.
    Listener,
}

/// Object-safe bridge from a stored binding to one handler call.
pub(crate) trait Invoke<A: Args> {
    /// Run the handler once against `args`. Returns `false` when the weak
    /// target has expired, in which case nothing was called.
    fn invoke(&self, args: &mut A) -> bool;

    /// Whether the target can still receive calls. Strong targets always can.
    fn is_live(&self) -> bool;
}

struct StrongTyped<S, A: Args> {
    target: Rc<S>,
    handler: Handler<S, A>,
}

impl<S, A: Args> Invoke<A> for StrongTyped<S, A> {
    fn invoke(&self, args: &mut A) -> bool {
        (self.handler)(&*self.target, args.pass());
        true
    }

    fn is_live(&self) -> bool {
        true
    }
}

struct WeakTyped<S, A: Args> {
    target: Weak<S>,
    handler: Handler<S, A>,
}

impl<S, A: Args> Invoke<A> for WeakTyped<S, A> {
    fn invoke(&self, args: &mut A) -> bool {
        // The upgraded handle keeps the subscriber alive for the duration of
        // its own call, even if a handler drops the last outside reference.
        match self.target.upgrade() {
            Some(target) => {
                (self.handler)(&*target, args.pass());
                true
            }
            None => false,
        }
    }

    fn is_live(&self) -> bool {
        self.target.strong_count() > 0
    }
}

struct StrongListener<L: ?Sized> {
    target: Rc<L>,
}

impl<A: Args, L: Listener<A> + ?Sized> Invoke<A> for StrongListener<L> {
    fn invoke(&self, args: &mut A) -> bool {
        self.target.on_broadcast(args.pass());
        true
    }

    fn is_live(&self) -> bool {
        true
    }
}

struct WeakListener<L: ?Sized> {
    target: Weak<L>,
}

impl<A: Args, L: Listener<A> + ?Sized> Invoke<A> for WeakListener<L> {
    fn invoke(&self, args: &mut A) -> bool {
        match self.target.upgrade() {
            Some(target) => {
                target.on_broadcast(args.pass());
                true
            }
            None => false,
        }
    }

    fn is_live(&self) -> bool {
        self.target.strong_count() > 0
    }
}

/// One subscription: owner identity, handler identity, and the erased call.
pub(crate) struct BindingNode<A: Args> {
    pub(crate) owner: OwnerKey,
    pub(crate) handler: HandlerKey,
    /// Set when the binding is pulled while a broadcast is on the stack.
    /// Marked nodes are skipped by every pass and dropped at compaction.
    pub(crate) removed: Cell<bool>,
    pub(crate) invoker: Box<dyn Invoke<A>>,
}

impl<A: Args + 'static> BindingNode<A> {
    pub(crate) fn strong_typed<S: 'static>(owner: &Rc<S>, handler: Handler<S, A>) -> Rc<Self> {
        BindingNode::with_invoker(
            OwnerKey::of_rc(owner),
            HandlerKey::Typed(handler as usize),
            Box::new(StrongTyped {
                target: Rc::clone(owner),
                handler,
            }),
        )
    }

    pub(crate) fn weak_typed<S: 'static>(owner: &Rc<S>, handler: Handler<S, A>) -> Rc<Self> {
        BindingNode::with_invoker(
            OwnerKey::of_rc(owner),
            HandlerKey::Typed(handler as usize),
            Box::new(WeakTyped {
                target: Rc::downgrade(owner),
                handler,
            }),
        )
    }

    pub(crate) fn weak_typed_from_handle<S: 'static>(
        owner: &Weak<S>,
        handler: Handler<S, A>,
    ) -> Rc<Self> {
        BindingNode::with_invoker(
            OwnerKey::of_weak(owner),
            HandlerKey::Typed(handler as usize),
            Box::new(WeakTyped {
                target: Weak::clone(owner),
                handler,
            }),
        )
    }

    pub(crate) fn strong_listener<L>(owner: &Rc<L>) -> Rc<Self>
    where
        L: Listener<A> + ?Sized + 'static,
    {
        BindingNode::with_invoker(
            OwnerKey::of_rc(owner),
            HandlerKey::Listener,
            Box::new(StrongListener {
                target: Rc::clone(owner),
            }),
        )
    }

    pub(crate) fn weak_listener<L>(owner: &Rc<L>) -> Rc<Self>
    where
        L: Listener<A> + ?Sized + 'static,
    {
        BindingNode::with_invoker(
            OwnerKey::of_rc(owner),
            HandlerKey::Listener,
            Box::new(WeakListener {
                target: Rc::downgrade(owner),
            }),
        )
    }

    fn with_invoker(owner: OwnerKey, handler: HandlerKey, invoker: Box<dyn Invoke<A>>) -> Rc<Self> {
        Rc::new(BindingNode {
            owner,
            handler,
            removed: Cell::new(false),
            invoker,
        })
    }
}

impl<A: Args> BindingNode<A> {
    /// Exact-match test used by removal. Deliberately ignores weak expiry so
    /// a stale binding can still be removed by the pair that registered it.
    pub(crate) fn matches(&self, owner: OwnerKey, handler: HandlerKey) -> bool {
        !self.removed.get() && self.owner == owner && self.handler == handler
    }

    pub(crate) fn owned_by(&self, owner: OwnerKey) -> bool {
        !self.removed.get() && self.owner == owner
    }
}
