//! Interceptor generation.

use indexmap::IndexMap;

use crate::{registry::FunctionKey, Error};

/// Origin of a function bound in a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Ordinary function owned by the namespace; calls never reach the global function
    /// or an interceptor.
    User,
    /// Interceptor installed by [`MockGenerator::generate()`].
    Generated,
}

/// Installs interceptors, at most one per `(namespace, function)` pair.
///
/// The generator keeps a table of functions bound in each namespace together with
/// their [`Origin`]. A generated binding is permanent for the lifetime of the generator:
/// afterwards, the behavior of the interceptor is reconfigured exclusively via
/// the [`CallbackRegistry`](crate::CallbackRegistry).
#[derive(Debug, Default)]
pub struct MockGenerator {
    bindings: IndexMap<FunctionKey, Origin>,
}

impl MockGenerator {
    fn validate(namespace: &str, function_name: &str) -> Result<(), Error> {
        if namespace.trim().is_empty() {
            return Err(Error::invalid_argument(
                "namespace",
                "Given namespace is empty",
            ));
        }
        if function_name.trim().is_empty() {
            return Err(Error::invalid_argument(
                "function_name",
                "Given function name is empty",
            ));
        }
        Ok(())
    }

    fn origin(&self, namespace: &str, function_name: &str) -> Option<Origin> {
        self.bindings
            .get(&FunctionKey::new(namespace, function_name))
            .copied()
    }

    /// Checks whether an interceptor was generated for the specified function.
    pub fn has_generated(&self, namespace: &str, function_name: &str) -> bool {
        self.origin(namespace, function_name) == Some(Origin::Generated)
    }

    /// Checks whether the namespace owns an ordinary function with the specified name.
    pub fn is_user_defined(&self, namespace: &str, function_name: &str) -> bool {
        self.origin(namespace, function_name) == Some(Origin::User)
    }

    /// Declares that the namespace owns an ordinary function with the specified name.
    /// Repeated declarations are no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if either argument is empty (after trimming).
    /// - [`Error::AlreadyMocked`] if an interceptor was generated for the function.
    pub fn define_user_function(
        &mut self,
        namespace: &str,
        function_name: &str,
    ) -> Result<(), Error> {
        Self::validate(namespace, function_name)?;
        let key = FunctionKey::new(namespace, function_name);
        match self.bindings.get(&key) {
            Some(Origin::Generated) => Err(Error::AlreadyMocked { key }),
            Some(Origin::User) => Ok(()),
            None => {
                self.bindings.insert(key, Origin::User);
                Ok(())
            }
        }
    }

    /// Generates an interceptor for the specified function.
    ///
    /// # Errors
    ///
    /// Checks are performed in the following order:
    ///
    /// - [`Error::InvalidArgument`] if the namespace is empty (after trimming).
    /// - [`Error::InvalidArgument`] if the function name is empty (after trimming).
    /// - [`Error::DefinedByUser`] if the namespace owns an ordinary function
    ///   with the same name.
    /// - [`Error::AlreadyMocked`] if an interceptor was already generated.
    pub fn generate(&mut self, namespace: &str, function_name: &str) -> Result<(), Error> {
        Self::validate(namespace, function_name)?;

        let key = FunctionKey::new(namespace, function_name);
        match self.bindings.get(&key) {
            Some(Origin::User) => return Err(Error::DefinedByUser { key }),
            Some(Origin::Generated) => return Err(Error::AlreadyMocked { key }),
            None => { /* continue */ }
        }

        tracing::debug!(%key, "generated interceptor");
        self.bindings.insert(key, Origin::Generated);
        Ok(())
    }

    /// Iterates over functions with generated interceptors in the generation order.
    pub fn generated(&self) -> impl Iterator<Item = &FunctionKey> + '_ {
        self.bindings
            .iter()
            .filter_map(|(key, origin)| (*origin == Origin::Generated).then_some(key))
    }
}
