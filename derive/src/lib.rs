//! Procedural macros for `interpose`.

#![recursion_limit = "128"]

extern crate proc_macro;

mod function;
mod utils;

use proc_macro::TokenStream;

/// Turns a free function into an interceptable shim of the global function with the same name.
///
/// The function body must call the real global function; it is executed unless
/// the function is mocked. The attribute can also be placed on an inline module,
/// in which case it applies to all functions in the module.
///
/// # Attributes
///
/// - `namespace = "..."`: namespace of the shim. Defaults to `module_path!()`.
#[proc_macro_attribute]
pub fn shadow(attr: TokenStream, item: TokenStream) -> TokenStream {
    function::wrap(attr, item)
}
