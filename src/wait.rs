use crate::{Error, Promise};
use std::cell::RefCell;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

/// Awaits the outcome of a [`Promise`].
///
/// Any number of waits may be taken on clones of one promise; each gets its
/// own copy of the outcome.
///
/// The entry a pending `Wait` leaves in the promise's waiter queue only holds
/// a weak handle to its waker. Dropping the `Wait` releases the waker at once
/// and the entry does nothing when the promise settles.
///
/// # Examples
///
/// ```
/// use sync_promise::Promise;
/// use futures::executor::block_on;
///
/// let deferred = Promise::<String>::deferred();
/// let promise = deferred.promise.clone();
/// let waiting = async move { promise.await };
/// deferred.resolve.resolve(String::from("🍓"));
/// assert_eq!(block_on(waiting), Ok(String::from("🍓")));
/// ```
#[derive(Debug)]
pub struct Wait<T, E = Error> {
    promise: Promise<T, E>,
    registration: Registration,
}

#[derive(Debug)]
enum Registration {
    Fresh,
    Waiting(Rc<RefCell<Option<Waker>>>),
}

impl<T, E> IntoFuture for Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    type Output = Result<T, E>;
    type IntoFuture = Wait<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        Wait {
            promise: self,
            registration: Registration::Fresh,
        }
    }
}

impl<T, E> Future for Wait<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(outcome) = this.promise.outcome() {
            return Poll::Ready(outcome);
        }
        if let Registration::Waiting(waker) = &this.registration {
            *waker.borrow_mut() = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let waker = Rc::new(RefCell::new(Some(cx.waker().clone())));
        let slot: Weak<RefCell<Option<Waker>>> = Rc::downgrade(&waker);
        this.promise.subscribe(Box::new(move |_: Result<T, E>| {
            let Some(slot) = slot.upgrade() else {
                return;
            };
            let waker = slot.borrow_mut().take();
            if let Some(waker) = waker {
                waker.wake()
            }
        }));
        this.registration = Registration::Waiting(waker);
        Poll::Pending
    }
}
