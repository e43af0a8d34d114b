//! Argument packs and parameter-passing modes for delegate signatures.
//!
//! A delegate signature is an argument pack: `()`, a single passing-mode
//! wrapper, or a tuple of wrappers (up to four slots). Each wrapper decides
//! what every handler receives when the pack is broadcast:
//! - [`Val`] - hand each handler its own clone of the value
//! - [`Ref`] - hand each handler a shared `&T` view
//! - [`Mut`] - hand each handler `&mut T` access to the caller's storage
//! - [`Handoff`] - offer a payload that at most one handler takes
//!
//! The caller keeps ownership of the pack for the whole broadcast; handlers
//! only ever see the view produced by [`Param::pass`] for their own call, so
//! writes through [`Mut`] land in the caller's storage and are visible to
//! every later handler in the same pass.

/// A single slot in an argument pack.
///
/// Implementors choose the view [`pass`](Param::pass) hands to each handler.
/// `pass` runs once per handler per broadcast, so the view must be derivable
/// any number of times from the stored value.
pub trait Param {
    /// What a handler receives for this slot.
    type Passed<'a>
    where
        Self: 'a;

    /// Produce this slot's view for one handler call.
    fn pass(&mut self) -> Self::Passed<'_>;
}

/// Copy-in passing: every handler receives its own clone of the value.
///
/// Mutations a handler makes to its copy are invisible to the caller and to
/// the other handlers in the pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Val<T>(pub T);

impl<T: Clone> Param for Val<T> {
    type Passed<'a>
        = T
    where
        Self: 'a;

    fn pass(&mut self) -> T {
        self.0.clone()
    }
}

/// Read-only passing: every handler receives `&T` into the caller's storage.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ref<T>(pub T);

impl<T> Param for Ref<T> {
    type Passed<'a>
        = &'a T
    where
        Self: 'a;

    fn pass(&mut self) -> &T {
        &self.0
    }
}

/// In-place passing: every handler receives `&mut T` into the caller's
/// storage.
///
/// Handlers run in order, so a later handler observes every write an earlier
/// one made. The caller reads the final value back out of the pack after the
/// broadcast returns, which makes this the out-parameter mode.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mut<T>(pub T);

impl<T> Param for Mut<T> {
    type Passed<'a>
        = &'a mut T
    where
        Self: 'a;

    fn pass(&mut self) -> &mut T {
        &mut self.0
    }
}

/// Transfer passing: a payload that at most one handler takes ownership of.
///
/// Every handler in the pass is offered the same slot. The first to call
/// [`take`](Handoff::take) receives `Some(payload)` and empties the slot;
/// everyone after it, and the caller once the broadcast returns, observes the
/// slot as taken. Handlers that only want to look can [`peek`](Handoff::peek)
/// without consuming.
#[derive(Debug)]
pub struct Handoff<T>(Option<T>);

impl<T> Handoff<T> {
    /// Wrap a payload for transfer to whichever handler claims it first.
    pub fn new(payload: T) -> Self {
        Handoff(Some(payload))
    }

    /// Take ownership of the payload, leaving the slot empty.
    pub fn take(&mut self) -> Option<T> {
        self.0.take()
    }

    /// Look at the payload without consuming it.
    pub fn peek(&self) -> Option<&T> {
        self.0.as_ref()
    }

    /// Whether the payload has already been claimed.
    pub fn is_taken(&self) -> bool {
        self.0.is_none()
    }

    /// Recover the payload after a broadcast in which nobody claimed it.
    pub fn into_inner(self) -> Option<T> {
        self.0
    }
}

impl<T> Param for Handoff<T> {
    type Passed<'a>
        = &'a mut Handoff<T>
    where
        Self: 'a;

    fn pass(&mut self) -> &mut Handoff<T> {
        self
    }
}

/// Signature of a typed handler bound to a subscriber of type `S`.
///
/// Handlers are plain `fn` items taking shared access to the subscriber plus
/// the pack's per-handler views; subscribers use interior mutability for any
/// state the handler updates. Being function pointers, handlers compare by
/// address, which is what exact-match removal relies on. Optimized builds can
/// merge identical function bodies or duplicate one across codegen units, so
/// removal is only as precise as the addresses the final binary kept distinct.
pub type Handler<S, A> = for<'a> fn(&S, <A as Args>::Passed<'a>);

/// A whole argument pack: the signature a [`Delegate`](crate::Delegate) is
/// generic over.
///
/// Implemented for `()`, for each passing-mode wrapper used bare, and for
/// tuples of wrappers. [`pass`](Args::pass) projects every slot once,
/// producing the views a single handler call receives.
pub trait Args {
    /// The per-handler view of the whole pack.
    type Passed<'a>
    where
        Self: 'a;

    /// Produce the pack's views for one handler call.
    fn pass(&mut self) -> Self::Passed<'_>;
}

impl Args for () {
    type Passed<'a>
        = ()
    where
        Self: 'a;

    fn pass(&mut self) {}
}

impl<T: Clone> Args for Val<T> {
    type Passed<'a>
        = T
    where
        Self: 'a;

    fn pass(&mut self) -> T {
        Param::pass(self)
    }
}

impl<T> Args for Ref<T> {
    type Passed<'a>
        = &'a T
    where
        Self: 'a;

    fn pass(&mut self) -> &T {
        Param::pass(self)
    }
}

impl<T> Args for Mut<T> {
    type Passed<'a>
        = &'a mut T
    where
        Self: 'a;

    fn pass(&mut self) -> &mut T {
        Param::pass(self)
    }
}

impl<T> Args for Handoff<T> {
    type Passed<'a>
        = &'a mut Handoff<T>
    where
        Self: 'a;

    fn pass(&mut self) -> &mut Handoff<T> {
        Param::pass(self)
    }
}

impl<P0: Param> Args for (P0,) {
    type Passed<'a>
        = (P0::Passed<'a>,)
    where
        Self: 'a;

    fn pass(&mut self) -> Self::Passed<'_> {
        (self.0.pass(),)
    }
}

impl<P0: Param, P1: Param> Args for (P0, P1) {
    type Passed<'a>
        = (P0::Passed<'a>, P1::Passed<'a>)
    where
        Self: 'a;

    fn pass(&mut self) -> Self::Passed<'_> {
        (self.0.pass(), self.1.pass())
    }
}

impl<P0: Param, P1: Param, P2: Param> Args for (P0, P1, P2) {
    type Passed<'a>
        = (P0::Passed<'a>, P1::Passed<'a>, P2::Passed<'a>)
    where
        Self: 'a;

    fn pass(&mut self) -> Self::Passed<'_> {
        (self.0.pass(), self.1.pass(), self.2.pass())
    }
}

impl<P0: Param, P1: Param, P2: Param, P3: Param> Args for (P0, P1, P2, P3) {
    type Passed<'a>
        = (P0::Passed<'a>, P1::Passed<'a>, P2::Passed<'a>, P3::Passed<'a>)
    where
        Self: 'a;

    fn pass(&mut self) -> Self::Passed<'_> {
        (self.0.pass(), self.1.pass(), self.2.pass(), self.3.pass())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Val ====================

    #[test]
    fn test_val_hands_out_independent_clones() {
        let mut slot = Val(vec![1, 2, 3]);

        let mut first = Param::pass(&mut slot);
        first.push(4);

        let second = Param::pass(&mut slot);
        assert_eq!(second, vec![1, 2, 3], "later passes see the original");
        assert_eq!(slot.0, vec![1, 2, 3], "caller storage is untouched");
    }

    // ==================== Ref ====================

    #[test]
    fn test_ref_reads_caller_storage() {
        let mut slot = Ref(String::from("shared"));
        assert_eq!(Param::pass(&mut slot), "shared");
    }

    // ==================== Mut ====================

    #[test]
    fn test_mut_writes_land_in_caller_storage() {
        let mut slot = Mut(10);

        *Param::pass(&mut slot) += 5;
        assert_eq!(slot.0, 15);

        // A later pass observes the earlier write.
        assert_eq!(*Param::pass(&mut slot), 15);
    }

    // ==================== Handoff ====================

    #[test]
    fn test_handoff_first_take_wins() {
        let mut slot = Handoff::new(String::from("payload"));

        let taken = Param::pass(&mut slot).take();
        assert_eq!(taken.as_deref(), Some("payload"));

        assert!(slot.is_taken());
        assert_eq!(Param::pass(&mut slot).take(), None);
    }

    #[test]
    fn test_handoff_peek_does_not_consume() {
        let mut slot = Handoff::new(7u32);

        assert_eq!(Param::pass(&mut slot).peek(), Some(&7));
        assert!(!slot.is_taken());
        assert_eq!(slot.take(), Some(7));
    }

    #[test]
    fn test_handoff_into_inner_recovers_unclaimed_payload() {
        let slot = Handoff::new(42);
        assert_eq!(slot.into_inner(), Some(42));

        let mut claimed = Handoff::new(42);
        let _ = claimed.take();
        assert_eq!(claimed.into_inner(), None);
    }

    // ==================== packs ====================

    #[test]
    fn test_unit_pack_passes_nothing() {
        let mut pack = ();
        Args::pass(&mut pack);
    }

    #[test]
    fn test_bare_wrapper_is_a_whole_pack() {
        let mut pack = Val(9);
        assert_eq!(Args::pass(&mut pack), 9);
    }

    #[test]
    fn test_tuple_pack_projects_each_slot() {
        let mut pack = (Val(1), Mut(2.0f64), Ref('c'));

        {
            let (copied, out, shared) = Args::pass(&mut pack);
            assert_eq!(copied, 1);
            *out = 6.5;
            assert_eq!(*shared, 'c');
        }

        assert_eq!(pack.1.0, 6.5, "out-parameter write reaches the pack");
    }

    #[test]
    fn test_four_slot_pack() {
        let mut pack = (Val(1u8), Ref(2u16), Mut(3u32), Handoff::new(4u64));

        {
            let (a, b, c, d) = Args::pass(&mut pack);
            assert_eq!(a, 1);
            assert_eq!(*b, 2);
            *c += 1;
            assert_eq!(d.take(), Some(4));
        }

        assert_eq!(pack.2.0, 4);
        assert!(pack.3.is_taken());
    }
}
