//! Facade tying together the registry, the generator and function mocks.

use indexmap::IndexMap;

use core::fmt;
use std::collections::HashMap;

use crate::{
    expectation::{FunctionMock, VerifyMock},
    generator::MockGenerator,
    registry::{CallbackRegistry, FunctionKey},
    target::{signature, ErasedTarget, Target},
    Error, Static,
};

/// Scope of the process-wide [`Environment`] instance.
#[cfg(not(feature = "shared"))]
pub type EnvironmentScope = crate::ThreadLocal<Environment>;
/// Scope of the process-wide [`Environment`] instance.
#[cfg(feature = "shared")]
pub type EnvironmentScope = crate::Shared<Environment>;

/// Context holding everything necessary to intercept functions: the [`CallbackRegistry`],
/// the [`MockGenerator`], real global functions and currently active mocks.
///
/// Code using the [`shadow`](crate::shadow) attribute is wired to the process-wide
/// instance available via [`Self::instance()`] (also used by the free functions
/// in the crate root, such as [`mock()`](crate::mock)). An `Environment` can also be
/// created explicitly and passed to code that performs calls via [`Self::call()`].
///
/// # Examples
///
/// ```
/// use interpose::Environment;
///
/// fn due_date(env: &Environment, issued_at: u64) -> u64 {
///     env.call("billing", "offset", (issued_at,), |(at,)| at + 86_400)
/// }
///
/// let mut env = Environment::new();
/// env.define_global("offset", |(at,): (u64,)| at + 86_400)?;
/// assert_eq!(due_date(&env, 0), 86_400);
///
/// let mock = env.get_mock::<(u64,), u64>("billing", "offset")?;
/// mock.expect().with((0,)).once().return_const(1);
/// assert_eq!(due_date(&env, 0), 1);
///
/// env.cleanup()?;
/// assert_eq!(due_date(&env, 0), 86_400);
/// # Ok::<_, interpose::Error>(())
/// ```
#[derive(Default)]
pub struct Environment {
    registry: CallbackRegistry,
    generator: MockGenerator,
    globals: HashMap<String, ErasedTarget>,
    mocked: IndexMap<FunctionKey, Box<dyn VerifyMock>>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Environment")
            .field("registry", &self.registry)
            .field("generator", &self.generator)
            .field("globals", &self.globals)
            .field("mocked", &self.mocked.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Environment {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide instance. The instance is lazily created on the first access.
    ///
    /// By default, the instance is [thread-local](crate::ThreadLocal); with the `shared`
    /// crate feature, it is [shared](crate::Shared) among all threads.
    pub fn instance() -> &'static Static<EnvironmentScope> {
        static INSTANCE: Static<EnvironmentScope> = Static::new();
        &INSTANCE
    }

    /// Returns the callback registry.
    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    /// Returns an exclusive reference to the callback registry.
    pub fn registry_mut(&mut self) -> &mut CallbackRegistry {
        &mut self.registry
    }

    /// Returns the interceptor generator.
    pub fn generator(&self) -> &MockGenerator {
        &self.generator
    }

    /// Returns an exclusive reference to the interceptor generator.
    pub fn generator_mut(&mut self) -> &mut MockGenerator {
        &mut self.generator
    }

    /// Defines a real global function. Only functions shadowing a global can be mocked.
    /// Redefining a global replaces the previous definition; interceptors that are not
    /// currently mocked forward calls to the new definition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the name is empty (after trimming).
    pub fn define_global<A, R, F>(&mut self, name: &str, function: F) -> Result<(), Error>
    where
        A: 'static,
        R: 'static,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        if name.trim().is_empty() {
            return Err(Error::invalid_argument(
                "name",
                "Given function name is empty",
            ));
        }
        let target = ErasedTarget::from(Target::new(function));
        tracing::debug!(name, signature = target.signature(), "defined global function");

        let restored: Vec<_> = self
            .registry
            .get_all()
            .filter(|entry| {
                entry.function_name() == name && !self.mocked.contains_key(entry.key())
            })
            .map(|entry| entry.key().clone())
            .collect();
        for key in restored {
            self.registry.set_erased(key, target.clone());
        }
        self.globals.insert(name.to_owned(), target);
        Ok(())
    }

    /// Checks whether a global function with the specified name is defined.
    pub fn has_global(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }

    /// Declares that the namespace owns an ordinary function with the specified name,
    /// so that it cannot be intercepted.
    ///
    /// # Errors
    ///
    /// See [`MockGenerator::define_user_function()`].
    pub fn define_local(&mut self, namespace: &str, function_name: &str) -> Result<(), Error> {
        self.generator
            .define_user_function(namespace, function_name)
    }

    /// Creates a mock for the specified function and makes the function interceptor
    /// forward all calls to it. The interceptor is generated if necessary.
    ///
    /// If the function is already mocked, the previous mock is replaced and will not be
    /// verified on [cleanup](Self::cleanup()).
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if no global function with `function_name`
    ///   is [defined](Self::define_global()).
    /// - Errors produced by [`MockGenerator::generate()`].
    /// - [`Error::SignatureMismatch`] if the global function has a signature other
    ///   than `fn(A) -> R`.
    pub fn get_mock<A, R>(
        &mut self,
        namespace: &str,
        function_name: &str,
    ) -> Result<FunctionMock<A, R>, Error>
    where
        A: fmt::Debug + 'static,
        R: 'static,
    {
        let Some(global) = self.globals.get(function_name) else {
            let reason = format!("The global function with name `{function_name}` does not exist.");
            return Err(Error::invalid_argument("function_name", reason));
        };
        let key = FunctionKey::new(namespace, function_name);
        if global.downcast::<A, R>().is_none() {
            return Err(Error::SignatureMismatch {
                key,
                expected: signature::<A, R>(),
                actual: global.signature(),
            });
        }

        if !self.generator.has_generated(namespace, function_name) {
            self.generator.generate(namespace, function_name)?;
        }

        let mock = FunctionMock::new(key.clone());
        let target = {
            let mock = mock.clone();
            Target::new(move |args| mock.call(args))
        };
        self.registry.set_erased(key.clone(), target.into());

        tracing::debug!(%key, "created function mock");
        if self.mocked.insert(key, Box::new(mock.clone())).is_some() {
            tracing::warn!(
                namespace,
                function_name,
                "replaced function mock before cleanup; the replaced mock will not be verified"
            );
        }
        Ok(mock)
    }

    /// Iterates over currently mocked functions in the order they were mocked.
    pub fn mocked(&self) -> impl Iterator<Item = &FunctionKey> + '_ {
        self.mocked.keys()
    }

    /// Restores all mocked functions so that their interceptors forward calls to the real
    /// global functions, and verifies each mock. Each mock is verified once; repeated cleanups
    /// only concern mocks created after the previous cleanup.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if a mocked function has no global definition to restore;
    ///   the interceptor keeps forwarding calls to the mock in this case.
    /// - [`Error::Verification`] listing all failed mocks.
    ///
    /// All other functions are restored and all mocks are verified regardless of errors.
    pub fn cleanup(&mut self) -> Result<(), Error> {
        let mut failures = vec![];
        let mut unrestored = None;
        for (key, mock) in self.mocked.drain(..) {
            if let Some(global) = self.globals.get(key.name()) {
                self.registry.set_erased(key.clone(), global.clone());
                tracing::debug!(%key, "restored global function");
            } else {
                tracing::error!(%key, "cannot restore function without global definition");
                unrestored.get_or_insert(key.clone());
            }

            if let Err(err) = mock.verify() {
                tracing::warn!(%key, %err, "function mock failed verification");
                failures.push(err);
            }
        }

        if let Some(key) = unrestored {
            let reason = format!(
                "The global function with name `{}` does not exist.",
                key.name()
            );
            Err(Error::invalid_argument("function_name", reason))
        } else if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Verification { failures })
        }
    }

    /// Returns the current target for the specified function, or `None` if the function
    /// has no generated interceptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the interceptor is generated, but the registry has no target
    /// with the matching signature. See [`CallbackRegistry::get()`].
    pub fn interceptor<A: 'static, R: 'static>(
        &self,
        namespace: &str,
        function_name: &str,
    ) -> Result<Option<Target<A, R>>, Error> {
        if self.generator.has_generated(namespace, function_name) {
            self.registry.get(namespace, function_name).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Calls the specified function from the specified namespace. If the function has
    /// a generated interceptor, the call is forwarded to the current target; otherwise,
    /// `real` is called.
    ///
    /// # Panics
    ///
    /// Panics if getting the [interceptor](Self::interceptor()) fails.
    pub fn call<A: 'static, R: 'static>(
        &self,
        namespace: &str,
        function_name: &str,
        args: A,
        real: impl FnOnce(A) -> R,
    ) -> R {
        match self.interceptor(namespace, function_name) {
            Ok(Some(target)) => target.call(args),
            Ok(None) => real(args),
            Err(err) => panic!("{err}"),
        }
    }
}
