//! `resolve`, `reject`, `all` and `race`, built on the public promise API.

use crate::{Error, Promise, Resolution};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

impl<T, E> Promise<T, E>
where
    T: Clone + 'static,
    E: Clone + From<Error> + 'static,
{
    /// A promise for `value`.
    ///
    /// A promise is returned unchanged. Plain values give a fulfilled promise and
    /// thenables are adopted.
    pub fn resolve(value: impl Into<Resolution<T, E>>) -> Self {
        match value.into() {
            Resolution::Promise(promise) => promise,
            resolution => Self::new(move |resolve, _| {
                resolve.resolve(resolution);
                Ok(())
            }),
        }
    }

    /// A promise already rejected with `reason`.
    pub fn reject(reason: E) -> Self {
        Self::new(move |_, reject| {
            reject.reject(reason);
            Ok(())
        })
    }

    /// Fulfills with every input's value, in input order, once all have
    /// fulfilled. Rejects with the first rejection. Plain values are accepted
    /// alongside promises.
    pub fn all<I>(promises: I) -> Promise<Vec<T>, E>
    where
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        let inputs: Vec<Resolution<T, E>> = promises.into_iter().map(Into::into).collect();
        Promise::<Vec<T>, E>::new(move |resolve, reject| {
            if inputs.is_empty() {
                resolve.resolve(Resolution::Value(Vec::new()));
                return Ok(());
            }

            let values: Rc<RefCell<Vec<Option<T>>>> =
                Rc::new(RefCell::new(vec![None; inputs.len()]));
            let remaining = Rc::new(Cell::new(inputs.len()));
            for (index, input) in inputs.into_iter().enumerate() {
                let values = values.clone();
                let remaining = remaining.clone();
                let resolve = resolve.clone();
                let reject = reject.clone();
                Self::resolve(input).then(
                    move |value| {
                        values.borrow_mut()[index] = Some(value);
                        remaining.set(remaining.get() - 1);
                        if remaining.get() == 0 {
                            let collected: Vec<T> =
                                values.borrow_mut().drain(..).flatten().collect();
                            resolve.resolve(Resolution::Value(collected));
                        }
                        Ok(Resolution::Value(()))
                    },
                    move |reason| {
                        reject.reject(reason);
                        Ok(Resolution::Value(()))
                    },
                );
            }
            Ok(())
        })
    }

    /// Settles like whichever input settles first. Stays pending forever when
    /// given no inputs.
    pub fn race<I>(promises: I) -> Promise<T, E>
    where
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        let inputs: Vec<Resolution<T, E>> = promises.into_iter().map(Into::into).collect();
        Self::new(move |resolve, reject| {
            for input in inputs {
                let resolve = resolve.clone();
                let reject = reject.clone();
                Self::resolve(input).then(
                    move |value| {
                        resolve.resolve(Resolution::Value(value));
                        Ok(Resolution::Value(()))
                    },
                    move |reason| {
                        reject.reject(reason);
                        Ok(Resolution::Value(()))
                    },
                );
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{Deferred, Error, Promise, Resolution, State};

    #[test]
    fn test_resolve_returns_same_promise() {
        let original: Promise<i32> = Promise::resolve(5);
        let again: Promise<i32> = Promise::resolve(original.clone());
        assert!(again.ptr_eq(&original));
    }

    #[test]
    fn test_resolve_flattens_nested_promise() {
        let nested: Promise<i32> = Promise::resolve(Promise::resolve(5));
        assert_eq!(nested.outcome(), Some(Ok(5)));
    }

    #[test]
    fn test_reject_is_rejected() {
        let promise: Promise<i32> = Promise::reject(Error::from("no"));
        assert_eq!(promise.state(), State::Rejected);
        assert_eq!(promise.outcome(), Some(Err(Error::from("no"))));
    }

    #[test]
    fn test_all_empty() {
        let all = Promise::<i32>::all(Vec::<Promise<i32>>::new());
        assert_eq!(all.outcome(), Some(Ok(Vec::new())));
    }

    #[test]
    fn test_all_keeps_input_order() {
        let first = Deferred::<i32>::new();
        let second = Deferred::<i32>::new();
        let inputs: Vec<Resolution<i32, Error>> = vec![
            first.promise.clone().into(),
            Resolution::Value(0),
            second.promise.clone().into(),
        ];
        let all = Promise::<i32>::all(inputs);
        second.resolve.resolve(2);
        assert!(all.is_pending());
        first.resolve.resolve(1);
        assert_eq!(all.outcome(), Some(Ok(vec![1, 0, 2])));
    }

    #[test]
    fn test_all_rejects_with_first_reason() {
        let slow = Deferred::<i32>::new();
        let failing = Deferred::<i32>::new();
        let all = Promise::<i32>::all(vec![slow.promise.clone(), failing.promise.clone()]);
        failing.reject.reject(Error::from("boom"));
        assert_eq!(all.outcome(), Some(Err(Error::from("boom"))));

        slow.resolve.resolve(1);
        assert_eq!(all.outcome(), Some(Err(Error::from("boom"))));
    }

    #[test]
    fn test_race_first_settled_wins() {
        let never = Deferred::<i32>::new();
        let ready: Promise<i32> = Promise::resolve(1);
        let race = Promise::<i32>::race(vec![never.promise.clone(), ready]);
        assert_eq!(race.outcome(), Some(Ok(1)));
    }

    #[test]
    fn test_race_ignores_later_settlements() {
        let a = Deferred::<i32>::new();
        let b = Deferred::<i32>::new();
        let race = Promise::<i32>::race(vec![a.promise.clone(), b.promise.clone()]);
        assert!(race.is_pending());

        b.reject.reject(Error::from("b lost"));
        a.resolve.resolve(1);
        assert_eq!(race.outcome(), Some(Err(Error::from("b lost"))));
    }

    #[test]
    fn test_race_empty_stays_pending() {
        let race = Promise::<i32>::race(Vec::<Promise<i32>>::new());
        assert!(race.is_pending());
    }
}
