//! Thread-local implementation of `Scope`.

use core::{cell::RefCell, mem};

use crate::Scope;

/// Thread-local scope wrapper.
///
/// This is the default scope of the process-wide [`Environment`](crate::Environment).
/// As the name implies, this wrapper does not share the value across threads: each thread
/// lazily gets its own default value. In particular, tests executed on separate threads
/// (which is the default for `cargo test`) cannot observe each other's mocks.
/// If a thread is spawned during a test, interceptable functions called from this thread
/// will use the real implementations. If cross-thread interception is required,
/// consider the [`Shared`](crate::Shared) wrapper.
///
/// # Examples
///
/// ```
/// use interpose::{Scope, ThreadLocal};
/// # use std::thread;
///
/// let scope = ThreadLocal::<Vec<u32>>::default();
/// scope.with(|values| values.push(42));
/// thread::scope(|s| {
///     s.spawn(|| assert!(scope.with(|values| values.is_empty())));
/// });
/// assert_eq!(scope.with(|values| values.clone()), [42]);
/// ```
#[derive(Debug)]
pub struct ThreadLocal<T: Send> {
    tls: thread_local::ThreadLocal<RefCell<T>>,
}

impl<T: Send> Default for ThreadLocal<T> {
    fn default() -> Self {
        Self {
            tls: thread_local::ThreadLocal::new(),
        }
    }
}

impl<T: Send + Default> Scope for ThreadLocal<T> {
    type Value = T;

    fn with<R>(&self, action: impl FnOnce(&mut T) -> R) -> R {
        let cell = self.tls.get_or_default();
        let mut value = cell.try_borrow_mut().unwrap_or_else(|_| {
            panic!("cannot access thread-local state while it is already being accessed");
        });
        action(&mut *value)
    }

    fn replace(&self, value: T) -> T {
        self.with(|current| mem::replace(current, value))
    }
}
