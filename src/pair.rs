use crate::resolution::{handles, Reject, Resolve};
use crate::{Error, Promise};

/// A pending promise paired with the handles that settle it.
///
/// This is what an adapter holds on to when the outcome arrives later, from
/// its own completion callback. Both handles share one guard: whichever is
/// called first wins and every later call is ignored.
///
/// # Examples
///
/// ```
/// use sync_promise::{Deferred, Error, State};
///
/// let deferred = Deferred::<String>::new();
/// assert_eq!(deferred.promise.state(), State::Pending);
///
/// deferred.reject.reject(Error::from("💥"));
/// deferred.resolve.resolve(String::from("🍓"));
/// assert_eq!(deferred.promise.outcome(), Some(Err(Error::from("💥"))));
/// ```
#[derive(Debug)]
pub struct Deferred<T, E = Error> {
    pub promise: Promise<T, E>,
    pub resolve: Resolve<T, E>,
    pub reject: Reject<T, E>,
}

impl<T, E> Deferred<T, E> {
    pub fn new() -> Self {
        let promise = Promise::pending();
        let (resolve, reject) = handles(&promise, None);
        Self {
            promise,
            resolve,
            reject,
        }
    }
}

impl<T, E> Default for Deferred<T, E> {
    fn default() -> Self {
        Self::new()
    }
}
