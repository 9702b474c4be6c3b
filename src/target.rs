//! Callable targets that interceptors forward calls to.

use core::{any::Any, fmt};
use std::sync::Arc;

/// Callable handling calls to an intercepted function.
///
/// `A` is the tuple of the function args (`()` for functions without args, `(T,)` for
/// a single arg and so on); `R` is the return type.
///
/// # Examples
///
/// ```
/// # use interpose::Target;
/// let target = Target::new(|(a, b): (u32, u32)| a + b);
/// assert_eq!(target.call((2, 3)), 5);
/// let copy = target.clone();
/// assert!(Target::ptr_eq(&target, &copy));
/// ```
pub struct Target<A, R> {
    inner: Arc<dyn Fn(A) -> R + Send + Sync>,
}

impl<A, R> Clone for Target<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A, R> fmt::Debug for Target<A, R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Target")
            .field("signature", &signature::<A, R>())
            .finish()
    }
}

impl<A, R> Target<A, R> {
    /// Wraps the provided function.
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(function),
        }
    }

    /// Invokes the target.
    pub fn call(&self, args: A) -> R {
        (self.inner)(args)
    }

    /// Checks whether two targets are clones of the same callable.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }
}

pub(crate) fn signature<A, R>() -> &'static str {
    core::any::type_name::<fn(A) -> R>()
}

/// [`Target`] with the signature erased.
#[derive(Clone)]
pub struct ErasedTarget {
    inner: Arc<dyn Any + Send + Sync>,
    signature: &'static str,
}

impl fmt::Debug for ErasedTarget {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ErasedTarget")
            .field("signature", &self.signature)
            .finish()
    }
}

impl<A: 'static, R: 'static> From<Target<A, R>> for ErasedTarget {
    fn from(target: Target<A, R>) -> Self {
        Self {
            inner: Arc::new(target),
            signature: signature::<A, R>(),
        }
    }
}

impl ErasedTarget {
    /// Returns the human-readable signature of the target, such as `fn((u32,)) -> bool`.
    pub fn signature(&self) -> &'static str {
        self.signature
    }

    /// Restores the typed target, or returns `None` if the signature does not match.
    pub fn downcast<A: 'static, R: 'static>(&self) -> Option<Target<A, R>> {
        self.inner.downcast_ref::<Target<A, R>>().cloned()
    }
}
