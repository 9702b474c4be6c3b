//! Lower-level traits used to generalize the concept of an environment shared between tests
//! and the tested code.

/// Provides exclusive access to a value stored in a certain scope (e.g., per thread
/// or per process).
pub trait Scope {
    /// Type of the scoped value.
    type Value;

    /// Runs `action` with exclusive access to the value.
    ///
    /// # Panics
    ///
    /// Implementations panic if `action` (directly or indirectly) calls `with()` on the same
    /// scope.
    fn with<R>(&self, action: impl FnOnce(&mut Self::Value) -> R) -> R;

    /// Replaces the value, returning the previous one.
    fn replace(&self, value: Self::Value) -> Self::Value;

    /// Resets the value to its default state, returning the previous one.
    fn reset(&self) -> Self::Value
    where
        Self::Value: Default,
    {
        self.replace(Self::Value::default())
    }
}
