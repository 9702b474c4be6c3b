//! Thread-safe implementation of `Scope`.

use parking_lot::ReentrantMutex;

use core::{cell::RefCell, mem};

use crate::Scope;

/// Scope wrapper sharing the value across all threads of the process.
///
/// This type is the scope of the process-wide [`Environment`](crate::Environment)
/// if the `shared` crate feature is enabled.
///
/// Unlike [`ThreadLocal`](crate::ThreadLocal) wrapper, this one shares the value across
/// threads, with access synchronized via a reentrant mutex. Thus, an interceptor generated
/// in one thread is visible in all threads, and generation for the same function
/// is serialized.
///
/// # Pitfalls
///
/// Tests running concurrently share a single environment; a test can observe mocks
/// set up by another test, and [`cleanup()`](crate::cleanup) verifies all mocks
/// regardless of the test that created them. To deal with this, either run tests
/// one at a time via `cargo test -- --test-threads=1`, or serialize mocking tests
/// with a lock.
///
/// # Examples
///
/// ```
/// use interpose::{Scope, Shared};
/// # use std::thread;
///
/// let scope = Shared::<Vec<u32>>::default();
/// thread::scope(|s| {
///     for i in 0..5 {
///         let scope = &scope;
///         s.spawn(move || scope.with(|values| values.push(i)));
///     }
/// });
/// assert_eq!(scope.with(|values| values.len()), 5);
/// ```
#[derive(Debug)]
pub struct Shared<T> {
    inner: ReentrantMutex<RefCell<T>>,
}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self {
            inner: ReentrantMutex::new(RefCell::new(T::default())),
        }
    }
}

impl<T> Scope for Shared<T> {
    type Value = T;

    fn with<R>(&self, action: impl FnOnce(&mut T) -> R) -> R {
        let guard = self.inner.lock();
        let mut value = guard.try_borrow_mut().unwrap_or_else(|_| {
            panic!("cannot access shared state while it is already being accessed");
        });
        action(&mut *value)
    }

    fn replace(&self, value: T) -> T {
        self.with(|current| mem::replace(current, value))
    }
}
