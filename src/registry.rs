//! Registry of current call targets.

use indexmap::IndexMap;

use core::fmt;

use crate::{
    target::{signature, ErasedTarget, Target},
    Error,
};

/// Identifier of an interceptable function: the namespace the interceptor lives in
/// and the function name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionKey {
    namespace: String,
    name: String,
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}::{}", self.namespace, self.name)
    }
}

impl FunctionKey {
    /// Creates a key. Neither part is validated.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Returns the namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the function name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Entry of a [`CallbackRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry<'a> {
    key: &'a FunctionKey,
    target: &'a ErasedTarget,
}

impl<'a> RegistryEntry<'a> {
    /// Returns the entry key.
    pub fn key(&self) -> &'a FunctionKey {
        self.key
    }

    /// Returns the namespace of the intercepted function.
    pub fn namespace(&self) -> &'a str {
        self.key.namespace()
    }

    /// Returns the name of the intercepted function.
    pub fn function_name(&self) -> &'a str {
        self.key.name()
    }

    /// Returns the current target.
    pub fn target(&self) -> &'a ErasedTarget {
        self.target
    }
}

/// Mapping from intercepted functions to the targets their interceptors currently forward to.
///
/// The registry is a plain key–value store: it does not check whether an interceptor
/// was actually [generated](crate::MockGenerator) for a key. Keys are enumerated
/// in the order of their first insertion; overwriting a target keeps the key position.
///
/// # Examples
///
/// ```
/// # use interpose::{CallbackRegistry, Target};
/// let mut registry = CallbackRegistry::default();
/// registry.set("app::billing", "now", Target::new(|()| 42_u64));
/// let target = registry.get::<(), u64>("app::billing", "now")?;
/// assert_eq!(target.call(()), 42);
///
/// let names: Vec<_> = registry.get_all().map(|entry| entry.function_name()).collect();
/// assert_eq!(names, ["now"]);
/// # Ok::<_, interpose::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    entries: IndexMap<FunctionKey, ErasedTarget>,
}

impl CallbackRegistry {
    /// Inserts or overwrites the target for the specified function. Empty strings
    /// are permitted for both parts of the key.
    pub fn set<A: 'static, R: 'static>(
        &mut self,
        namespace: &str,
        function_name: &str,
        target: Target<A, R>,
    ) {
        self.set_erased(FunctionKey::new(namespace, function_name), target.into());
    }

    pub(crate) fn set_erased(&mut self, key: FunctionKey, target: ErasedTarget) {
        tracing::debug!(%key, signature = target.signature(), "setting call target");
        self.entries.insert(key, target);
    }

    /// Returns the target for the specified function.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no target was set for the function.
    /// - [`Error::SignatureMismatch`] if the target has a signature other than `fn(A) -> R`.
    pub fn get<A: 'static, R: 'static>(
        &self,
        namespace: &str,
        function_name: &str,
    ) -> Result<Target<A, R>, Error> {
        let key = FunctionKey::new(namespace, function_name);
        let Some(target) = self.entries.get(&key) else {
            return Err(Error::NotFound { key });
        };
        target
            .downcast()
            .ok_or_else(|| Error::SignatureMismatch {
                expected: signature::<A, R>(),
                actual: target.signature(),
                key,
            })
    }

    /// Iterates over all entries in their insertion order.
    pub fn get_all(&self) -> impl ExactSizeIterator<Item = RegistryEntry<'_>> + '_ {
        self.entries
            .iter()
            .map(|(key, target)| RegistryEntry { key, target })
    }

    /// Checks whether a target is set for the specified function.
    pub fn contains(&self, namespace: &str, function_name: &str) -> bool {
        self.entries
            .contains_key(&FunctionKey::new(namespace, function_name))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn set_then_get_returns_same_target() {
        let mut registry = CallbackRegistry::default();
        let target = Target::new(|(x,): (u32,)| x * 2);
        registry.set("Foo", "double", target.clone());

        let restored = registry.get::<(u32,), u32>("Foo", "double").unwrap();
        assert!(Target::ptr_eq(&restored, &target));
        assert_eq!(restored.call((21,)), 42);
    }

    #[test]
    fn empty_strings_are_valid_keys() {
        let mut registry = CallbackRegistry::default();
        registry.set("", "", Target::new(|()| "empty"));
        assert!(registry.contains("", ""));
        assert_eq!(registry.get::<(), &str>("", "").unwrap().call(()), "empty");
    }

    #[test]
    fn getting_missing_key() {
        let mut registry = CallbackRegistry::default();
        registry.set("Foo", "mail", Target::new(|()| true));

        let err = registry.get::<(), bool>("Bar", "mail").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
        assert!(err.to_string().contains("`Bar::mail`"), "{err}");
        match err {
            Error::NotFound { key } => assert_eq!(key, FunctionKey::new("Bar", "mail")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn getting_target_with_wrong_signature() {
        let mut registry = CallbackRegistry::default();
        registry.set("Foo", "len", Target::new(|(s,): (String,)| s.len()));

        let err = registry.get::<(String,), u32>("Foo", "len").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
        match err {
            Error::SignatureMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, signature::<(String,), u32>());
                assert_eq!(actual, signature::<(String,), usize>());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn entries_keep_first_insertion_order() {
        let mut registry = CallbackRegistry::default();
        registry.set("Foo", "mail", Target::new(|()| 1));
        registry.set("Bar", "file_get_contents", Target::new(|()| 2));
        registry.set("Foo", "range", Target::new(|()| 3));
        let replacement = Target::new(|()| 4);
        registry.set("Foo", "mail", replacement.clone());

        let keys: Vec<_> = registry
            .get_all()
            .map(|entry| (entry.namespace(), entry.function_name()))
            .collect();
        assert_eq!(
            keys,
            [("Foo", "mail"), ("Bar", "file_get_contents"), ("Foo", "range")]
        );

        let first = registry.get_all().next().unwrap();
        let first_target = first.target().downcast::<(), i32>().unwrap();
        assert!(Target::ptr_eq(&first_target, &replacement));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn key_display() {
        let key = FunctionKey::new("app::billing", "now");
        assert_eq!(key.to_string(), "app::billing::now");
        assert_eq!(key.namespace(), "app::billing");
        assert_eq!(key.name(), "now");
    }
}
