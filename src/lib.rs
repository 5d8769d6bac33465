//! A settle-once promise with synchronous dispatch.
//!
//! A [`Promise`] starts pending and settles exactly once, to a value or a
//! reason. Continuations registered with [`Promise::then`] run inline: right
//! away if the promise has already settled, otherwise in registration order
//! at the moment it settles. Values that are themselves promises or
//! [`Thenable`]s are unwrapped rather than stored, and a promise resolved with
//! itself is rejected with [`Error::SelfResolution`].
//!
//! ```
//! use sync_promise::{Error, Promise, Resolution};
//!
//! let (ok, failed): (Promise<i32>, Promise<i32>) =
//!     (Promise::resolve(1), Promise::reject(Error::from("boom")));
//!
//! let all = Promise::<i32>::all(vec![ok.clone(), failed]);
//! assert_eq!(all.outcome(), Some(Err(Error::from("boom"))));
//!
//! let chained: Promise<i32> =
//!     ok.and_then(|x| Ok(Resolution::Promise(Promise::resolve(x + 1))));
//! assert_eq!(chained.outcome(), Some(Ok(2)));
//! ```
//!
//! Everything is single-threaded: promises are `!Send` and nothing is ever
//! scheduled. A promise can also be awaited, see [`Wait`].

mod combinators;
mod error;
pub mod pair;
mod promise;
mod resolution;
mod wait;

pub use error::Error;
pub use pair::Deferred;
pub use promise::{OnFulfilled, OnRejected, Promise, State};
pub use resolution::{Reject, Resolution, Resolve, Thenable};
pub use wait::Wait;
