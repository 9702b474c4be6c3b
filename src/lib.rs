//! Verifiable mocks for free functions based on per-namespace interceptors.
//!
//! Code under test frequently calls free functions that are inconvenient in tests:
//! reading the clock, sending mail, querying the environment. This crate allows replacing
//! such calls with verifiable mocks *per namespace*, i.e., per module calling the function,
//! without touching the function itself.
//!
//! The approach is as follows. A module that wants its calls to a global function to be
//! interceptable declares a *shim* with the same name, annotated with the [`shadow`]
//! attribute; the shim body calls the real global function. Since Rust resolves
//! `now()` inside a module to the module's own `now` first, all calls in the module
//! go through the shim. The shim consults the process-wide [`Environment`]:
//!
//! - If a test has requested a mock for the function in this namespace, an *interceptor*
//!   is generated (once per namespace / function pair) in the [`MockGenerator`], and the shim
//!   forwards calls to the current *target* stored in the [`CallbackRegistry`].
//! - Otherwise, the shim simply calls the real function.
//!
//! After a test is finished, [`cleanup()`] makes all interceptors forward calls to the real
//! global functions again and verifies the call expectations of all mocks
//! (each mock is verified exactly once).
//!
//! # Features and limitations
//!
//! - Interceptable functions are free functions with owned (`'static`) args and return
//!   values; generic functions, methods, `async` and `const` functions are not supported.
//! - Only functions [defined](define_global()) as globals can be mocked. Conversely,
//!   a namespace can [declare](define_local()) an ordinary function, which is then never
//!   intercepted in this namespace.
//! - An interceptor, once generated, is never removed; its behavior is reconfigured by
//!   updating the registry.
//! - Mocks support call count expectations, argument matchers and stubbed responses;
//!   see [`FunctionMock`].
//! - By default, the [`Environment`] is thread-local, so that tests running in parallel
//!   do not interfere. The `shared` crate feature makes it process-wide.
//!
//! # Examples
//!
//! ```
//! mod clock {
//!     pub fn now() -> u64 {
//!         1_000
//!     }
//! }
//!
//! mod billing {
//!     // All calls to `now()` from this module go through the interceptor.
//!     #[interpose::shadow(namespace = "billing")]
//!     fn now() -> u64 {
//!         crate::clock::now()
//!     }
//!
//!     pub fn due_date() -> u64 {
//!         now() + 86_400
//!     }
//! }
//!
//! # fn main() -> Result<(), interpose::Error> {
//! interpose::define_global("now", |()| clock::now())?;
//! assert_eq!(billing::due_date(), 87_400);
//!
//! let mock = interpose::mock::<(), u64>("billing", "now")?;
//! mock.expect().once().return_const(0);
//! assert_eq!(billing::due_date(), 86_400);
//!
//! interpose::cleanup()?;
//! assert_eq!(billing::due_date(), 87_400);
//! # Ok(())
//! # }
//! ```
//!
//! Unmet expectations are reported by [`cleanup()`]:
//!
//! ```
//! # use interpose::{Error, ErrorKind};
//! # fn main() -> Result<(), Error> {
//! interpose::define_global("mail", |(to,): (String,)| !to.is_empty())?;
//! let mock = interpose::mock::<(String,), bool>("app::notify", "mail")?;
//! mock.expect().with(("admin@example.com".to_owned(),)).once().return_const(true);
//!
//! // The tested code never sends the mail...
//! let err = interpose::cleanup().unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::Verification);
//! // ...but the mock is verified only once.
//! interpose::cleanup()?;
//! # Ok(())
//! # }
//! ```

// Documentation settings.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc(html_root_url = "https://docs.rs/interpose/0.1.0")]
// Linter settings.
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::must_use_candidate, clippy::module_name_repetitions)]

use once_cell::sync::OnceCell;

use core::fmt;

mod environment;
mod error;
mod expectation;
mod generator;
mod registry;
mod shared;
mod target;
mod tls;
mod traits;

pub use crate::{
    environment::{Environment, EnvironmentScope},
    error::{Error, ErrorKind},
    expectation::{Expectation, FunctionMock, Times, VerificationError},
    generator::{MockGenerator, Origin},
    registry::{CallbackRegistry, FunctionKey, RegistryEntry},
    shared::Shared,
    target::{ErasedTarget, Target},
    tls::ThreadLocal,
    traits::Scope,
};
pub use interpose_derive::shadow;

#[cfg(doctest)]
doc_comment::doctest!("../README.md");

/// Wrapper that allows creating `static`s with [`Scope`] implementations.
#[derive(Debug)]
pub struct Static<S> {
    cell: OnceCell<S>,
}

impl<S> Static<S> {
    /// Creates a new instance.
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }
}

impl<S> Scope for Static<S>
where
    S: Scope + Default,
{
    type Value = S::Value;

    fn with<R>(&self, action: impl FnOnce(&mut S::Value) -> R) -> R {
        let cell = self.cell.get_or_init(S::default);
        cell.with(action)
    }

    fn replace(&self, value: S::Value) -> S::Value {
        let cell = self.cell.get_or_init(S::default);
        cell.replace(value)
    }
}

/// Creates a mock for the specified function in the process-wide [`Environment`].
///
/// # Errors
///
/// See [`Environment::get_mock()`].
pub fn mock<A, R>(namespace: &str, function_name: &str) -> Result<FunctionMock<A, R>, Error>
where
    A: fmt::Debug + 'static,
    R: 'static,
{
    Environment::instance().with(|env| env.get_mock(namespace, function_name))
}

/// Defines a real global function in the process-wide [`Environment`].
///
/// # Errors
///
/// See [`Environment::define_global()`].
pub fn define_global<A, R, F>(name: &str, function: F) -> Result<(), Error>
where
    A: 'static,
    R: 'static,
    F: Fn(A) -> R + Send + Sync + 'static,
{
    Environment::instance().with(|env| env.define_global(name, function))
}

/// Declares an ordinary function in a namespace of the process-wide [`Environment`].
///
/// # Errors
///
/// See [`Environment::define_local()`].
pub fn define_local(namespace: &str, function_name: &str) -> Result<(), Error> {
    Environment::instance().with(|env| env.define_local(namespace, function_name))
}

/// Restores mocked functions and verifies mocks in the process-wide [`Environment`].
///
/// # Errors
///
/// See [`Environment::cleanup()`].
pub fn cleanup() -> Result<(), Error> {
    Environment::instance().with(Environment::cleanup)
}

/// Replaces the process-wide [`Environment`] with an empty one. Mocks in the replaced
/// environment are *not* verified.
pub fn reset() {
    Environment::instance().reset();
}

/// Fixed shim used by functions annotated with [`shadow`].
#[doc(hidden)] // only used by generated code
pub fn dispatch<A: 'static, R: 'static>(
    namespace: &str,
    function_name: &str,
    args: A,
    real: impl FnOnce(A) -> R,
) -> R {
    let interceptor =
        Environment::instance().with(|env| env.interceptor::<A, R>(namespace, function_name));
    // The environment is released at this point, so the target may call other shims.
    match interceptor {
        Ok(Some(target)) => target.call(args),
        Ok(None) => real(args),
        Err(err) => panic!("{err}"),
    }
}
