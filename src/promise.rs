//! The settle-once promise and its continuation queue.

use crate::pair::Deferred;
use crate::resolution::{do_resolve, Reject, Resolution, Resolve, Thenable};
use crate::Error;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// Observable state of a [`Promise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
}

/// A continuation registered on a promise, run once with its outcome.
pub(crate) trait Waiter<T, E> {
    fn notify(self: Box<Self>, outcome: Result<T, E>);
}

impl<T, E, F> Waiter<T, E> for F
where
    F: FnOnce(Result<T, E>),
{
    fn notify(self: Box<Self>, outcome: Result<T, E>) {
        (*self)(outcome)
    }
}

/// State and payload live in one enum so they always change together.
enum Slot<T, E> {
    Pending(Vec<Box<dyn Waiter<T, E>>>),
    Fulfilled(T),
    Rejected(E),
}

/// Fulfillment handler accepted by [`Promise::then_with`].
pub type OnFulfilled<T, U, E> = Box<dyn FnOnce(T) -> Result<Resolution<U, E>, E>>;
/// Rejection handler accepted by [`Promise::then_with`].
pub type OnRejected<U, E> = Box<dyn FnOnce(E) -> Result<Resolution<U, E>, E>>;

/// A value that becomes available later, exactly once.
///
/// A `Promise` is a shared handle: clones observe and settle the same
/// promise. It starts pending and settles at most once to fulfilled or
/// rejected. Continuations run synchronously, either immediately when
/// registered on a settled promise or, in registration order, at the
/// moment it settles.
///
/// # Examples
///
/// ```
/// use sync_promise::{Promise, Resolution};
///
/// let promise: Promise<i32> = Promise::new(|resolve, _reject| {
///     resolve.resolve(3);
///     Ok(())
/// });
/// let doubled: Promise<i32> = promise
///     .then(|x| Ok(Resolution::Value(x + 1)), |e| Err(e))
///     .and_then(|x| Ok(Resolution::Value(x * 2)));
/// assert_eq!(doubled.outcome(), Some(Ok(8)));
/// ```
pub struct Promise<T, E = Error> {
    slot: Rc<RefCell<Slot<T, E>>>,
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T, E> Promise<T, E> {
    /// Whether both handles refer to the same promise.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }

    pub fn state(&self) -> State {
        match &*self.slot.borrow() {
            Slot::Pending(_) => State::Pending,
            Slot::Fulfilled(_) => State::Fulfilled,
            Slot::Rejected(_) => State::Rejected,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    pub(crate) fn pending() -> Self {
        Self {
            slot: Rc::new(RefCell::new(Slot::Pending(Vec::new()))),
        }
    }
}

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    /// Creates a promise and runs `resolver` on it right away.
    ///
    /// The resolver receives the promise's [`Resolve`] and [`Reject`]
    /// handles; only the first call through either one counts. Returning
    /// `Err` from the resolver rejects the promise unless it was already
    /// settled.
    pub fn new<R>(resolver: R) -> Self
    where
        R: FnOnce(Resolve<T, E>, Reject<T, E>) -> Result<(), E> + 'static,
    {
        let promise = Self::pending();
        do_resolve(&promise, None, Resolution::Thenable(Box::new(resolver)));
        promise
    }

    /// Like [`Promise::new`], for callers that may not have a resolver.
    ///
    /// # Errors
    ///
    /// [`Error::NotCallable`] when `resolver` is `None`.
    pub fn try_new<R>(resolver: Option<R>) -> Result<Self, Error>
    where
        R: FnOnce(Resolve<T, E>, Reject<T, E>) -> Result<(), E> + 'static,
    {
        let resolver = resolver.ok_or(Error::NotCallable)?;
        Ok(Self::new(resolver))
    }

    /// A pending promise together with its resolve and reject handles.
    pub fn deferred() -> Deferred<T, E> {
        Deferred::new()
    }

    /// A copy of the settled value or reason, `None` while pending.
    pub fn outcome(&self) -> Option<Result<T, E>> {
        match &*self.slot.borrow() {
            Slot::Pending(_) => None,
            Slot::Fulfilled(value) => Some(Ok(value.clone())),
            Slot::Rejected(reason) => Some(Err(reason.clone())),
        }
    }

    /// Registers continuations and returns the promise they settle.
    ///
    /// Exactly one of the two handlers runs, once. Its `Ok` result is
    /// adopted into the returned promise (so returning another promise
    /// chains onto it); its `Err` rejects the returned promise.
    pub fn then<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U, E>, E> + 'static,
        R: FnOnce(E) -> Result<Resolution<U, E>, E> + 'static,
    {
        let deferred = Deferred::new();
        let derived = deferred.promise.clone();
        self.subscribe(Box::new(Reaction {
            on_fulfilled,
            on_rejected,
            deferred,
        }));
        derived
    }

    /// [`Promise::then`] with optional handlers.
    ///
    /// A missing fulfillment handler passes the value through; a missing
    /// rejection handler passes the reason through.
    pub fn then_with(
        &self,
        on_fulfilled: Option<OnFulfilled<T, T, E>>,
        on_rejected: Option<OnRejected<T, E>>,
    ) -> Promise<T, E> {
        let on_fulfilled: OnFulfilled<T, T, E> = match on_fulfilled {
            Some(handler) => handler,
            None => Box::new(returner),
        };
        let on_rejected: OnRejected<T, E> = match on_rejected {
            Some(handler) => handler,
            None => Box::new(thrower),
        };
        self.then(on_fulfilled, on_rejected)
    }

    /// Fulfillment-only `then`; rejections pass through untouched.
    pub fn and_then<U, F>(&self, on_fulfilled: F) -> Promise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Result<Resolution<U, E>, E> + 'static,
    {
        self.then(on_fulfilled, thrower)
    }

    /// Rejection-only `then`; values pass through untouched.
    pub fn catch<R>(&self, on_rejected: R) -> Promise<T, E>
    where
        R: FnOnce(E) -> Result<Resolution<T, E>, E> + 'static,
    {
        self.then(returner, on_rejected)
    }

    /// Runs `waiter` now if settled, otherwise queues it.
    ///
    /// Values are copied out under a shared borrow only, so a `Clone` impl
    /// may look at the promise it is being copied from.
    pub(crate) fn subscribe(&self, waiter: Box<dyn Waiter<T, E>>) {
        {
            let mut slot = self.slot.borrow_mut();
            if let Slot::Pending(waiters) = &mut *slot {
                waiters.push(waiter);
                return;
            }
        }
        if let Some(outcome) = self.outcome() {
            waiter.notify(outcome);
        }
    }

    /// Settles the promise and drains its waiters in registration order.
    pub(crate) fn adopt(&self, outcome: Result<T, E>) {
        let settled = match outcome.clone() {
            Ok(value) => Slot::Fulfilled(value),
            Err(reason) => Slot::Rejected(reason),
        };
        let waiters = {
            let mut slot = self.slot.borrow_mut();
            let Slot::Pending(waiters) = &mut *slot else {
                trace!("promise already settled; ignoring");
                return;
            };
            let waiters = std::mem::take(waiters);
            *slot = settled;
            waiters
        };
        trace!(
            fulfilled = outcome.is_ok(),
            waiters = waiters.len(),
            "promise settled"
        );
        for waiter in waiters {
            waiter.notify(outcome.clone());
        }
    }
}

impl<T, E> Thenable<T, E> for Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    fn then(self: Box<Self>, resolve: Resolve<T, E>, reject: Reject<T, E>) -> Result<(), E> {
        self.subscribe(Box::new(move |outcome: Result<T, E>| match outcome {
            Ok(value) => resolve.resolve(Resolution::Value(value)),
            Err(reason) => reject.reject(reason),
        }));
        Ok(())
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("state", &self.state())
            .finish()
    }
}

/// The waiter `then` leaves on its parent.
struct Reaction<U, E, F, R> {
    on_fulfilled: F,
    on_rejected: R,
    deferred: Deferred<U, E>,
}

impl<T, U, E, F, R> Waiter<T, E> for Reaction<U, E, F, R>
where
    U: Clone + 'static,
    E: Clone + From<Error> + 'static,
    F: FnOnce(T) -> Result<Resolution<U, E>, E>,
    R: FnOnce(E) -> Result<Resolution<U, E>, E>,
{
    fn notify(self: Box<Self>, outcome: Result<T, E>) {
        let Reaction {
            on_fulfilled,
            on_rejected,
            deferred,
        } = *self;
        let result = match outcome {
            Ok(value) => on_fulfilled(value),
            Err(reason) => on_rejected(reason),
        };
        match result {
            Ok(resolution) => do_resolve(
                &deferred.promise,
                Some(deferred.resolve.attempt()),
                resolution,
            ),
            Err(reason) => {
                trace!("continuation failed; rejecting derived promise");
                deferred.reject.reject(reason);
            }
        }
    }
}

fn returner<T, E>(value: T) -> Result<Resolution<T, E>, E> {
    Ok(Resolution::Value(value))
}

fn thrower<U, E>(reason: E) -> Result<Resolution<U, E>, E> {
    Err(reason)
}
