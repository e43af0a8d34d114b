//! Multicast delegates: ordered subscriber registries with reentrancy-safe
//! broadcast.
//!
//! A [`Delegate`] owns two binding lists, strong and weak, each kept in
//! registration order. Broadcasting walks a snapshot taken at call start
//! (strong bindings first, then weak), so handlers may freely add and remove
//! bindings, including their own, while the pass is running:
//! - additions become visible starting with the next broadcast
//! - removals take effect immediately, even for bindings the current pass
//!   has not reached yet
//! - expired weak subscribers are skipped and lazily pruned
//!
//! Registry bookkeeping never moves entries while a broadcast is on the
//! stack. Removals mark the shared binding node instead, and the lists are
//! compacted once the outermost pass returns.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use log::trace;
use smallvec::SmallVec;

use crate::args::{Args, Handler};
use crate::binding::{BindingNode, HandlerKey, OwnerKey};
use crate::listener::Listener;

type BindingList<A> = SmallVec<[Rc<BindingNode<A>>; 4]>;
type Snapshot<A> = SmallVec<[Rc<BindingNode<A>>; 8]>;

/// An ordered multicast callback list over the argument pack `A`.
///
/// Subscribers are shared values behind [`Rc`]. A strong binding keeps its
/// subscriber alive for as long as the binding is registered; a weak binding
/// holds a [`Weak`] handle and silently stops firing once the subscriber is
/// dropped elsewhere. The same owner/handler pair may be bound any number of
/// times and fires once per registration.
///
/// All operations take `&self`. The delegate is single-threaded and is
/// usually shared as `Rc<Delegate<A>>` between the broadcasting side and its
/// subscribers.
pub struct Delegate<A: Args> {
    strong: RefCell<BindingList<A>>,
    weak: RefCell<BindingList<A>>,
    /// Number of nested `broadcast` calls currently on the stack.
    depth: Cell<u32>,
    /// Set when a node was marked removed or found expired mid-broadcast.
    needs_compact: Cell<bool>,
}

impl<A: Args + 'static> Delegate<A> {
    /// Create an empty delegate.
    ///
    /// Annotate the binding when nothing else names the pack type; handler
    /// coercion at the `add_*` call sites needs `A` already pinned:
    /// `let on_hit: Delegate<Val<i32>> = Delegate::new();`
    pub fn new() -> Self {
        Delegate {
            strong: RefCell::new(SmallVec::new()),
            weak: RefCell::new(SmallVec::new()),
            depth: Cell::new(0),
            needs_compact: Cell::new(false),
        }
    }

    // ==================== subscription ====================

    /// Bind `handler` to fire with `owner`, keeping `owner` alive until the
    /// binding is removed or the delegate is dropped.
    pub fn add_strong<S: 'static>(&self, owner: &Rc<S>, handler: Handler<S, A>) {
        self.strong
            .borrow_mut()
            .push(BindingNode::strong_typed(owner, handler));
    }

    /// Bind `handler` to fire with `owner` without extending its lifetime.
    /// The binding goes quiet once the last strong handle to `owner` drops.
    pub fn add_weak<S: 'static>(&self, owner: &Rc<S>, handler: Handler<S, A>) {
        self.weak
            .borrow_mut()
            .push(BindingNode::weak_typed(owner, handler));
    }

    /// Like [`add_weak`](Delegate::add_weak), but from a [`Weak`] handle.
    ///
    /// This is the form to use while the subscriber is still under
    /// construction and no `&Rc<S>` exists yet, for example inside
    /// [`Rc::new_cyclic`]. The handle must point at an allocation that will
    /// come alive; binding a handle that can never upgrade is a bug in the
    /// caller.
    ///
    /// # Panics
    ///
    /// Panics when `owner` is already dead, since such a binding could never
    /// fire and the registration site is the only useful place to report it.
    pub fn add_weak_handle<S: 'static>(&self, owner: &Weak<S>, handler: Handler<S, A>) {
        assert!(
            owner.strong_count() > 0,
            "cannot bind a weak handle whose subscriber is already destroyed"
        );
        self.weak
            .borrow_mut()
            .push(BindingNode::weak_typed_from_handle(owner, handler));
    }

    /// Bind `owner` through its [`Listener`] impl, keeping it alive.
    ///
    /// Dispatch goes through the trait object, so binding an `Rc<dyn ...>`
    /// that actually points at a subtype invokes the most-derived impl.
    pub fn add_strong_listener<L>(&self, owner: &Rc<L>)
    where
        L: Listener<A> + ?Sized + 'static,
    {
        self.strong
            .borrow_mut()
            .push(BindingNode::strong_listener(owner));
    }

    /// Bind `owner` through its [`Listener`] impl without extending its
    /// lifetime.
    pub fn add_weak_listener<L>(&self, owner: &Rc<L>)
    where
        L: Listener<A> + ?Sized + 'static,
    {
        self.weak
            .borrow_mut()
            .push(BindingNode::weak_listener(owner));
    }

    // ==================== removal ====================

    /// Remove the first strong binding matching exactly this owner/handler
    /// pair. Other bindings, including other registrations of the same pair,
    /// are left untouched. Does nothing when no binding matches.
    pub fn remove_strong<S: 'static>(&self, owner: &Rc<S>, handler: Handler<S, A>) {
        self.remove_first(
            &self.strong,
            OwnerKey::of_rc(owner),
            HandlerKey::Typed(handler as usize),
            "strong",
        );
    }

    /// Remove the first weak binding matching exactly this owner/handler
    /// pair. Works even when the subscriber has already expired.
    pub fn remove_weak<S: 'static>(&self, owner: &Rc<S>, handler: Handler<S, A>) {
        self.remove_first(
            &self.weak,
            OwnerKey::of_rc(owner),
            HandlerKey::Typed(handler as usize),
            "weak",
        );
    }

    /// Remove the first strong listener binding of `owner`.
    pub fn remove_strong_listener<L>(&self, owner: &Rc<L>)
    where
        L: Listener<A> + ?Sized + 'static,
    {
        self.remove_first(
            &self.strong,
            OwnerKey::of_rc(owner),
            HandlerKey::Listener,
            "strong listener",
        );
    }

    /// Remove the first weak listener binding of `owner`.
    pub fn remove_weak_listener<L>(&self, owner: &Rc<L>)
    where
        L: Listener<A> + ?Sized + 'static,
    {
        self.remove_first(
            &self.weak,
            OwnerKey::of_rc(owner),
            HandlerKey::Listener,
            "weak listener",
        );
    }

    /// Remove every binding of `owner`, strong and weak, typed and listener.
    pub fn remove_all<S: ?Sized + 'static>(&self, owner: &Rc<S>) {
        let key = OwnerKey::of_rc(owner);
        self.remove_owned(&self.strong, key);
        self.remove_owned(&self.weak, key);
    }

    // ==================== queries ====================

    /// Number of strong bindings, duplicates included.
    pub fn num_strong(&self) -> usize {
        count_live(&self.strong)
    }

    /// Number of weak bindings whose subscriber is still alive, duplicates
    /// included. Expired bindings are excluded whether or not they have been
    /// physically pruned yet.
    pub fn num_weak(&self) -> usize {
        count_live(&self.weak)
    }

    /// Total bindings that would fire on a broadcast started now.
    pub fn num_bound(&self) -> usize {
        self.num_strong() + self.num_weak()
    }

    /// Whether `owner` has at least one strong binding registered.
    pub fn has_bound_strong<S: ?Sized + 'static>(&self, owner: &Rc<S>) -> bool {
        let key = OwnerKey::of_rc(owner);
        self.strong.borrow().iter().any(|node| node.owned_by(key))
    }

    // ==================== broadcast ====================

    /// Invoke every binding that was registered when the call started.
    ///
    /// The pass runs over a snapshot taken up front: strong bindings first,
    /// then weak, each in registration order. Bindings a handler adds during
    /// the pass are not visited until the next broadcast. Bindings a handler
    /// removes stop firing immediately, even when the victim had not been
    /// reached yet, so a binding that removes itself is invoked exactly once
    /// and never again. Weak bindings whose subscriber has expired are
    /// skipped and lazily pruned.
    ///
    /// Handlers may broadcast the same delegate reentrantly; every nested
    /// call snapshots the registry as it stands at that moment. The caller
    /// reads results of [`Mut`](crate::Mut) and [`Handoff`](crate::Handoff)
    /// slots back out of `args` after the call returns.
    pub fn broadcast(&self, args: &mut A) {
        let snapshot: Snapshot<A> = {
            let strong = self.strong.borrow();
            let weak = self.weak.borrow();
            strong.iter().chain(weak.iter()).cloned().collect()
        };

        self.depth.set(self.depth.get() + 1);
        for node in &snapshot {
            if node.removed.get() {
                continue;
            }
            if !node.invoker.invoke(args) {
                // Subscriber expired between registration and this pass.
                node.removed.set(true);
                self.needs_compact.set(true);
            }
        }
        self.depth.set(self.depth.get() - 1);

        if self.depth.get() == 0 && self.needs_compact.get() {
            self.compact();
        }
    }

    // ==================== internals ====================

    fn remove_first(
        &self,
        list: &RefCell<BindingList<A>>,
        owner: OwnerKey,
        handler: HandlerKey,
        kind: &str,
    ) {
        let mut list = list.borrow_mut();
        match list.iter().position(|node| node.matches(owner, handler)) {
            Some(index) => {
                if self.depth.get() == 0 {
                    list.remove(index);
                } else {
                    list[index].removed.set(true);
                    self.needs_compact.set(true);
                }
            }
            None => trace!("No matching {} binding to remove", kind),
        }
    }

    fn remove_owned(&self, list: &RefCell<BindingList<A>>, owner: OwnerKey) {
        let mut list = list.borrow_mut();
        if self.depth.get() == 0 {
            list.retain(|node| !node.owned_by(owner));
        } else {
            let mut marked = false;
            for node in list.iter() {
                if node.owned_by(owner) {
                    node.removed.set(true);
                    marked = true;
                }
            }
            if marked {
                self.needs_compact.set(true);
            }
        }
    }

    /// Physically drop marked and expired nodes. Only called with no
    /// broadcast on the stack, so snapshot indices are never invalidated.
    ///
    /// Evicted nodes are dropped after the list borrows are released: a
    /// strong node can hold the last handle to its subscriber, whose `Drop`
    /// may call back into this delegate.
    fn compact(&self) {
        let mut evicted: BindingList<A> = SmallVec::new();

        {
            let mut strong = self.strong.borrow_mut();
            for node in std::mem::take(&mut *strong) {
                if node.removed.get() {
                    evicted.push(node);
                } else {
                    strong.push(node);
                }
            }
        }
        {
            let mut weak = self.weak.borrow_mut();
            for node in std::mem::take(&mut *weak) {
                if !node.removed.get() && node.invoker.is_live() {
                    weak.push(node);
                } else {
                    evicted.push(node);
                }
            }
        }

        self.needs_compact.set(false);
        trace!("Compacted delegate lists, dropped {} bindings", evicted.len());
    }
}

fn count_live<A: Args>(list: &RefCell<BindingList<A>>) -> usize {
    list.borrow()
        .iter()
        .filter(|node| !node.removed.get() && node.invoker.is_live())
        .count()
}

impl<A: Args + 'static> Default for Delegate<A> {
    fn default() -> Self {
        Delegate::new()
    }
}

impl<A: Args + 'static> fmt::Debug for Delegate<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("strong", &self.num_strong())
            .field("weak", &self.num_weak())
            .field("broadcasting", &(self.depth.get() > 0))
            .finish()
    }
}
