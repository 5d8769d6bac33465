//! The thenable-unwrapping resolution procedure.
//!
//! Every value that settles a promise, whether handed to a resolver's
//! [`Resolve`] handle or returned from a `then` continuation, goes through
//! `do_resolve`. Plain values fulfill directly; promises and other
//! [`Thenable`]s are adopted by calling their `then` with a fresh pair of
//! handles guarded by a one-shot `Attempt`.

use crate::{Error, Promise};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

/// Anything that can settle a promise by calling back into it.
///
/// Returning `Err` counts as a synchronous failure: it rejects the adopting
/// promise unless one of the handles was already used.
pub trait Thenable<T, E> {
    fn then(self: Box<Self>, resolve: Resolve<T, E>, reject: Reject<T, E>) -> Result<(), E>;
}

impl<T, E, F> Thenable<T, E> for F
where
    F: FnOnce(Resolve<T, E>, Reject<T, E>) -> Result<(), E>,
{
    fn then(self: Box<Self>, resolve: Resolve<T, E>, reject: Reject<T, E>) -> Result<(), E> {
        (*self)(resolve, reject)
    }
}

/// A value a promise can be resolved with.
pub enum Resolution<T, E> {
    /// Fulfill with this value as is.
    Value(T),
    /// Adopt the eventual state of another promise.
    Promise(Promise<T, E>),
    /// Adopt whatever the thenable calls back with.
    Thenable(Box<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    pub fn thenable<Th>(thenable: Th) -> Self
    where
        Th: Thenable<T, E> + 'static,
    {
        Resolution::Thenable(Box::new(thenable))
    }
}

impl<T, E> From<T> for Resolution<T, E> {
    fn from(value: T) -> Self {
        Resolution::Value(value)
    }
}

impl<T, E> From<Promise<T, E>> for Resolution<T, E> {
    fn from(promise: Promise<T, E>) -> Self {
        Resolution::Promise(promise)
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Promise(_) => f.write_str("Promise(..)"),
            Resolution::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

/// One adoption of a value into `promise`.
///
/// `called` is shared by the attempt's `Resolve` and `Reject` handles so only
/// the first of them has any effect. `upstream` is where the attempt settles
/// to: `None` settles `promise` itself, otherwise the enclosing attempt.
pub(crate) struct Attempt<T, E> {
    promise: Promise<T, E>,
    called: Cell<bool>,
    upstream: Option<Rc<Attempt<T, E>>>,
}

impl<T, E> Attempt<T, E> {
    fn new(promise: Promise<T, E>, upstream: Option<Rc<Attempt<T, E>>>) -> Self {
        Self {
            promise,
            called: Cell::new(false),
            upstream,
        }
    }

    /// Returns `true` for the first caller only.
    fn claim(&self) -> bool {
        !self.called.replace(true)
    }
}

/// Creates the guarded handle pair for a new attempt on `promise`.
pub(crate) fn handles<T, E>(
    promise: &Promise<T, E>,
    upstream: Option<Rc<Attempt<T, E>>>,
) -> (Resolve<T, E>, Reject<T, E>) {
    let attempt = Rc::new(Attempt::new(promise.clone(), upstream));
    (
        Resolve {
            attempt: attempt.clone(),
        },
        Reject { attempt },
    )
}

/// Resolve side of a resolution attempt.
///
/// Cloning shares the attempt: across all clones and the paired [`Reject`],
/// only the first call takes effect.
pub struct Resolve<T, E> {
    attempt: Rc<Attempt<T, E>>,
}

/// Reject side of a resolution attempt.
pub struct Reject<T, E> {
    attempt: Rc<Attempt<T, E>>,
}

impl<T, E> Clone for Resolve<T, E> {
    fn clone(&self) -> Self {
        Self {
            attempt: self.attempt.clone(),
        }
    }
}

impl<T, E> Clone for Reject<T, E> {
    fn clone(&self) -> Self {
        Self {
            attempt: self.attempt.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Resolve<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolve")
            .field("called", &self.attempt.called.get())
            .finish()
    }
}

impl<T, E> fmt::Debug for Reject<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reject")
            .field("called", &self.attempt.called.get())
            .finish()
    }
}

impl<T, E> Resolve<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    /// Resolves with a plain value, a promise or a thenable.
    ///
    /// Promises and thenables are adopted, so the attempt's promise ends up
    /// in whatever state they eventually reach.
    pub fn resolve(&self, value: impl Into<Resolution<T, E>>) {
        if !self.attempt.claim() {
            trace!("resolve on an already used attempt; ignoring");
            return;
        }
        do_resolve(
            &self.attempt.promise,
            self.attempt.upstream.clone(),
            value.into(),
        );
    }

    pub(crate) fn attempt(&self) -> Rc<Attempt<T, E>> {
        self.attempt.clone()
    }
}

impl<T, E> Reject<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    pub fn reject(&self, reason: E) {
        if !self.attempt.claim() {
            trace!("reject on an already used attempt; ignoring");
            return;
        }
        reject_upstream(
            self.attempt.upstream.clone(),
            &self.attempt.promise,
            reason,
        );
    }
}

fn fulfill_upstream<T, E>(upstream: Option<Rc<Attempt<T, E>>>, promise: &Promise<T, E>, value: T)
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    match upstream {
        None => promise.adopt(Ok(value)),
        Some(attempt) => Resolve { attempt }.resolve(Resolution::Value(value)),
    }
}

fn reject_upstream<T, E>(upstream: Option<Rc<Attempt<T, E>>>, promise: &Promise<T, E>, reason: E)
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    match upstream {
        None => promise.adopt(Err(reason)),
        Some(attempt) => Reject { attempt }.reject(reason),
    }
}

/// Adopts `resolution` into `promise`, settling through `upstream`.
pub(crate) fn do_resolve<T, E>(
    promise: &Promise<T, E>,
    upstream: Option<Rc<Attempt<T, E>>>,
    resolution: Resolution<T, E>,
) where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    let thenable: Box<dyn Thenable<T, E>> = match resolution {
        Resolution::Value(value) => return fulfill_upstream(upstream, promise, value),
        Resolution::Promise(other) if other.ptr_eq(promise) => {
            debug!("promise resolved with itself");
            return reject_upstream(upstream, promise, E::from(Error::SelfResolution));
        }
        Resolution::Promise(other) => Box::new(other),
        Resolution::Thenable(thenable) => thenable,
    };

    let (resolve, reject) = handles(promise, upstream);
    let attempt = resolve.attempt();
    if let Err(reason) = thenable.then(resolve, reject) {
        if attempt.claim() {
            debug!("thenable failed before settling");
            reject_upstream(attempt.upstream.clone(), promise, reason);
        } else {
            trace!("thenable failed after settling; ignoring");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Reject, Resolution, Resolve, Thenable};
    use crate::{Error, Promise, State};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn adopt(thenable: impl Thenable<i32, Error> + 'static) -> Promise<i32> {
        Promise::resolve(Resolution::thenable(thenable))
    }

    #[test]
    fn test_thenable_calling_back_twice() {
        let promise = adopt(
            |resolve: Resolve<i32, Error>, reject: Reject<i32, Error>| -> Result<(), Error> {
                resolve.resolve(1);
                resolve.resolve(2);
                reject.reject("late".into());
                Ok(())
            },
        );
        assert_eq!(promise.outcome(), Some(Ok(1)));
    }

    #[test]
    fn test_thenable_failing_before_settling() {
        let promise = adopt(
            |_: Resolve<i32, Error>, _: Reject<i32, Error>| -> Result<(), Error> {
                Err(Error::from("thrown"))
            },
        );
        assert_eq!(promise.outcome(), Some(Err(Error::from("thrown"))));
    }

    #[test]
    fn test_thenable_failing_after_settling() {
        let promise = adopt(
            |resolve: Resolve<i32, Error>, _: Reject<i32, Error>| -> Result<(), Error> {
                resolve.resolve(7);
                Err(Error::from("thrown"))
            },
        );
        assert_eq!(promise.outcome(), Some(Ok(7)));
    }

    #[test]
    fn test_nested_thenables_flatten() {
        let inner = |resolve: Resolve<i32, Error>, _: Reject<i32, Error>| -> Result<(), Error> {
            resolve.resolve(42);
            Ok(())
        };
        let promise = adopt(
            move |resolve: Resolve<i32, Error>, _: Reject<i32, Error>| -> Result<(), Error> {
                resolve.resolve(Resolution::thenable(inner));
                Ok(())
            },
        );
        assert_eq!(promise.outcome(), Some(Ok(42)));
    }

    #[test]
    fn test_pending_thenable_keeps_promise_pending() {
        let stash: Rc<RefCell<Option<Resolve<i32, Error>>>> = Rc::new(RefCell::new(None));
        let slot = stash.clone();
        let promise = adopt(
            move |resolve: Resolve<i32, Error>, _: Reject<i32, Error>| -> Result<(), Error> {
                *slot.borrow_mut() = Some(resolve);
                Ok(())
            },
        );
        assert_eq!(promise.state(), State::Pending);

        let resolve = stash.borrow_mut().take().expect("thenable stored its handle");
        resolve.resolve(9);
        assert_eq!(promise.outcome(), Some(Ok(9)));
    }

    #[test]
    fn test_resolution_debug() {
        let value: Resolution<i32, Error> = 3.into();
        assert_eq!(format!("{value:?}"), "Value(3)");
        let promise: Resolution<i32, Error> = Resolution::Promise(Promise::resolve(3));
        assert_eq!(format!("{promise:?}"), "Promise(..)");
    }
}
