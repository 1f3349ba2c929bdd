//! Central state container with synchronous change notification.

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
    sync::atomic::{AtomicU64, Ordering},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        SubscriberId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

type Subscriber<S> = Rc<dyn Fn(&Rc<S>)>;

struct StoreInner<S> {
    state: RefCell<Rc<S>>,
    /// Bumped on every commit; a notification pass stops once it is stale.
    generation: Cell<u64>,
    subscribers: RefCell<Vec<(SubscriberId, Subscriber<S>)>>,
}

/// Holds the current snapshot of `S` and notifies subscribers on every commit.
///
/// Every commit stores a brand new `Rc<S>`, even when the contents are equal
/// to the previous snapshot, so consumers can detect commits by pointer.
///
/// Notification is synchronous and reentrant: a subscriber may commit again
/// from inside its callback, and that nested commit is applied and delivered
/// before the outer commit returns. Once that happens the outer pass stops,
/// since every remaining subscriber has already seen the newer snapshot.
/// Subscribers must not commit unconditionally from their own callback;
/// there is no cycle detection.
///
/// # Example
///
/// ```rust
/// use floem_form::Store;
///
/// let store = Store::new(1);
/// let sub = store.subscribe(|n| println!("now {n}"));
/// store.update(|n| n + 1);
/// assert_eq!(*store.get(), 2);
/// sub.unsubscribe();
/// ```
pub struct Store<S: 'static> {
    inner: Rc<StoreInner<S>>,
}

impl<S: 'static> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: 'static> Store<S> {
    pub fn new(state: S) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                state: RefCell::new(Rc::new(state)),
                generation: Cell::new(0),
                subscribers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// The current snapshot. This is the stored `Rc`, not a copy.
    pub fn get(&self) -> Rc<S> {
        self.inner.state.borrow().clone()
    }

    /// Replace the snapshot and notify subscribers.
    pub fn set(&self, next: S) {
        self.commit(Rc::new(next));
    }

    /// Commit a snapshot that is already shared elsewhere, keeping its
    /// identity.
    pub fn set_shared(&self, next: Rc<S>) {
        self.commit(next);
    }

    /// Compute the next snapshot from the current one and notify subscribers.
    ///
    /// The producer sees the state as of this call, including anything
    /// committed by subscribers of an enclosing commit.
    pub fn update(&self, producer: impl FnOnce(&S) -> S) {
        let current = self.get();
        self.commit(Rc::new(producer(&current)));
    }

    /// Register a callback for every future commit, in subscription order.
    pub fn subscribe(&self, f: impl Fn(&Rc<S>) + 'static) -> Subscription<S> {
        let id = SubscriberId::next();
        self.inner.subscribers.borrow_mut().push((id, Rc::new(f)));
        Subscription {
            id,
            store: Rc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    pub fn downgrade(&self) -> WeakStore<S> {
        WeakStore {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn commit(&self, next: Rc<S>) {
        *self.inner.state.borrow_mut() = next.clone();
        let generation = self.inner.generation.get() + 1;
        self.inner.generation.set(generation);

        // Collect first so callbacks can subscribe, unsubscribe or commit.
        let subscribers: Vec<_> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, f)| f.clone())
            .collect();

        for subscriber in subscribers {
            if self.inner.generation.get() != generation {
                tracing::trace!("notification pass superseded by a nested commit");
                break;
            }
            subscriber(&next);
        }
    }
}

/// A non-owning handle to a [`Store`].
pub struct WeakStore<S: 'static> {
    inner: Weak<StoreInner<S>>,
}

impl<S: 'static> Clone for WeakStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: 'static> WeakStore<S> {
    pub fn upgrade(&self) -> Option<Store<S>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

/// Returned by [`Store::subscribe`].
///
/// Dropping it does not unsubscribe. [`Subscription::unsubscribe`] can be
/// called any number of times, also after the store itself is gone.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription<S: 'static> {
    id: SubscriberId,
    store: Weak<StoreInner<S>>,
}

impl<S: 'static> Subscription<S> {
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.store.upgrade() {
            inner.subscribers.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}
