//! Shadowed function attribute.

use darling::FromMeta;
use proc_macro::TokenStream;
use quote::{quote, ToTokens};
use syn::{
    parse::Parser, punctuated::Punctuated, spanned::Spanned, token::Comma, FnArg, GenericParam,
    Ident, Item, ItemFn, ItemMod, NestedMeta, Pat, PatIdent, Signature,
};

use std::mem;

use crate::utils::{borrow_span, find_meta_attrs};

#[derive(Debug, Default, FromMeta)]
struct ShadowAttrs {
    namespace: Option<String>,
}

impl ShadowAttrs {
    fn parse(attr: TokenStream) -> darling::Result<Self> {
        let meta = Punctuated::<NestedMeta, Comma>::parse_terminated.parse(attr)?;
        let meta: Vec<_> = meta.into_iter().collect();
        Self::from_list(&meta)
    }
}

#[derive(Debug)]
struct FunctionWrapper {
    namespace: Option<String>,
    function: ItemFn,
    arg_patterns: Vec<Pat>,
    args: Vec<Ident>,
}

impl FunctionWrapper {
    fn can_process(signature: &Signature) -> darling::Result<()> {
        if let Some(const_token) = &signature.constness {
            let message = "const functions are not supported";
            return Err(darling::Error::custom(message).with_span(const_token));
        }
        if let Some(async_token) = &signature.asyncness {
            let message = "async functions are not supported";
            return Err(darling::Error::custom(message).with_span(async_token));
        }
        if let Some(variadic) = &signature.variadic {
            let message = "variadic functions are not supported";
            return Err(darling::Error::custom(message).with_span(variadic));
        }
        if let Some(FnArg::Receiver(receiver)) = signature.inputs.first() {
            let message = "methods are not supported; only free functions can be shadowed";
            return Err(darling::Error::custom(message).with_span(receiver));
        }

        let type_param = signature
            .generics
            .params
            .iter()
            .find(|param| !matches!(param, GenericParam::Lifetime(_)));
        if let Some(param) = type_param {
            let message = "generic functions are not supported";
            return Err(darling::Error::custom(message).with_span(param));
        }
        if let Some(span) = borrow_span(signature) {
            let message = "args and return values of shadowed functions must be `'static`; \
                 consider using owned types";
            return Err(syn::Error::new(span, message).into());
        }
        Ok(())
    }

    fn new(attrs: ShadowAttrs, mut function: ItemFn) -> darling::Result<Self> {
        Self::can_process(&function.sig)?;
        let (arg_patterns, args) = Self::take_arg_patterns(&mut function.sig);
        Ok(Self {
            namespace: attrs.namespace,
            function,
            arg_patterns,
            args,
        })
    }

    fn take_arg_patterns(sig: &mut Signature) -> (Vec<Pat>, Vec<Ident>) {
        let iter = sig.inputs.iter_mut().enumerate().map(|(i, arg)| {
            let span = arg.span();
            if let FnArg::Typed(pat_type) = arg {
                let ident = Ident::new(&format!("__arg{}", i), span);
                let simple_pat = Box::new(Pat::Ident(PatIdent {
                    attrs: vec![],
                    by_ref: None,
                    mutability: None,
                    ident: ident.clone(),
                    subpat: None,
                }));
                let original_pat = *mem::replace(&mut pat_type.pat, simple_pat);
                (original_pat, ident)
            } else {
                unreachable!() // filtered out previously
            }
        });
        iter.unzip()
    }

    fn namespace(&self) -> impl ToTokens {
        match &self.namespace {
            Some(namespace) => quote!(#namespace),
            None => quote!(module_path!()),
        }
    }

    fn dispatch_logic(&self) -> impl ToTokens {
        let namespace = self.namespace();
        let name = self.function.sig.ident.to_string();
        let arg_patterns = &self.arg_patterns;
        let args = &self.args;
        let block = &self.function.block;

        quote! {
            interpose::dispatch(
                #namespace,
                #name,
                (#(#args,)*),
                |(#(#arg_patterns,)*)| #block,
            )
        }
    }
}

impl ToTokens for FunctionWrapper {
    fn to_tokens(&self, tokens: &mut proc_macro2::TokenStream) {
        let attrs = &self.function.attrs;
        let vis = &self.function.vis;
        let signature = &self.function.sig;
        let logic = self.dispatch_logic();

        tokens.extend(quote! {
            #(#attrs)*
            #vis #signature {
                #logic
            }
        });
    }
}

#[derive(Debug)]
struct ModWrapper {
    module: ItemMod,
}

impl ModWrapper {
    fn new(attrs: &ShadowAttrs, mut module: ItemMod) -> darling::Result<Self> {
        if module.content.is_none() {
            let message = "only inline modules are supported";
            return Err(darling::Error::custom(message).with_span(&module));
        }

        let namespace = attrs.namespace.as_deref();
        if let Some((_, items)) = &mut module.content {
            for item in items {
                if let Item::Fn(function) = item {
                    if FunctionWrapper::can_process(&function.sig).is_ok()
                        && find_meta_attrs("shadow", Some("interpose"), &function.attrs).is_none()
                    {
                        Self::add_attr(function, namespace);
                    }
                }
            }
        }
        Ok(Self { module })
    }

    fn add_attr(function: &mut ItemFn, namespace: Option<&str>) {
        let attr = if let Some(namespace) = namespace {
            syn::parse_quote!(#[interpose::shadow(namespace = #namespace)])
        } else {
            syn::parse_quote!(#[interpose::shadow])
        };
        function.attrs.push(attr);
    }
}

impl ToTokens for ModWrapper {
    fn to_tokens(&self, tokens: &mut proc_macro2::TokenStream) {
        let module = &self.module;
        tokens.extend(quote!(#module));
    }
}

pub(crate) fn wrap(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attrs = match ShadowAttrs::parse(attr) {
        Ok(attrs) => attrs,
        Err(err) => return err.write_errors().into(),
    };
    let tokens = match syn::parse(item) {
        Ok(Item::Fn(function)) => {
            FunctionWrapper::new(attrs, function).map(|wrapper| quote!(#wrapper))
        }
        Ok(Item::Mod(module)) => ModWrapper::new(&attrs, module).map(|wrapper| quote!(#wrapper)),
        Ok(item) => {
            let message = "Item is not supported; use `#[shadow]` on functions or inline modules";
            Err(darling::Error::custom(message).with_span(&item))
        }
        Err(err) => return err.into_compile_error().into(),
    };

    match tokens {
        Ok(tokens) => tokens.into(),
        Err(err) => err.write_errors().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_wrapper(function: ItemFn) -> darling::Result<FunctionWrapper> {
        FunctionWrapper::new(ShadowAttrs::default(), function)
    }

    #[test]
    fn transforming_args() {
        let mut signature: Signature = syn::parse_quote! {
            fn test(
                mut this: Vec<u8>,
                &reference: &'static u8,
                [.., tail]: [u8; 4],
                Point { x, .. }: Point,
            ) -> String
        };
        let (arg_patterns, args) = FunctionWrapper::take_arg_patterns(&mut signature);

        assert_eq!(
            args.iter().map(ToString::to_string).collect::<Vec<_>>(),
            ["__arg0", "__arg1", "__arg2", "__arg3"]
        );
        let expected_sig: Signature = syn::parse_quote! {
            fn test(__arg0: Vec<u8>, __arg1: &'static u8, __arg2: [u8; 4], __arg3: Point,) -> String
        };
        assert_eq!(signature, expected_sig);

        let arg_patterns: Pat = syn::parse_quote!((#(#arg_patterns,)*));
        let expected_patterns: Pat = syn::parse_quote! {
            (mut this, &reference, [.., tail], Point { x, .. },)
        };
        assert_eq!(arg_patterns, expected_patterns);
    }

    #[test]
    fn simple_wrapper() {
        let function: ItemFn = syn::parse_quote! {
            /// Sends mail.
            pub fn mail(to: String, mut body: Vec<u8>) -> bool {
                body.push(0);
                crate::sys::mail(to, body)
            }
        };
        let wrapper = default_wrapper(function).unwrap();
        let wrapper: ItemFn = syn::parse_quote!(#wrapper);

        #[rustfmt::skip] // formatting removes the necessary trailing comma
        let expected: ItemFn = syn::parse_quote! {
            /// Sends mail.
            pub fn mail(__arg0: String, __arg1: Vec<u8>) -> bool {
                interpose::dispatch(
                    module_path!(),
                    "mail",
                    (__arg0, __arg1,),
                    |(to, mut body,)| {
                        body.push(0);
                        crate::sys::mail(to, body)
                    },
                )
            }
        };
        assert_eq!(wrapper, expected, "{}", quote!(#wrapper));
    }

    #[test]
    fn wrapper_without_args_and_with_namespace() {
        let attrs = ShadowAttrs {
            namespace: Some("app::billing".to_owned()),
        };
        let function: ItemFn = syn::parse_quote! {
            fn now() -> u64 { crate::clock::now() }
        };
        let wrapper = FunctionWrapper::new(attrs, function).unwrap();
        let wrapper: ItemFn = syn::parse_quote!(#wrapper);

        let expected: ItemFn = syn::parse_quote! {
            fn now() -> u64 {
                interpose::dispatch("app::billing", "now", (), |()| { crate::clock::now() },)
            }
        };
        assert_eq!(wrapper, expected, "{}", quote!(#wrapper));
    }

    #[test]
    fn errors_on_unsupported_functions() {
        let functions: [(ItemFn, &str); 6] = [
            (
                syn::parse_quote!(const fn test(x: u8, y: u8) -> u8 { x + y }),
                "const functions",
            ),
            (
                syn::parse_quote!(async fn test() -> u8 { 0 }),
                "async functions",
            ),
            (
                syn::parse_quote!(fn test(&self) -> u8 { 0 }),
                "methods are not supported",
            ),
            (
                syn::parse_quote!(fn test<T: Default>() -> T { T::default() }),
                "generic functions",
            ),
            (
                syn::parse_quote!(fn test(s: &str) -> usize { s.len() }),
                "must be `'static`",
            ),
            (
                syn::parse_quote!(fn test() -> impl Iterator<Item = u8> { 0..5 }),
                "must be `'static`",
            ),
        ];

        for (function, expected_message) in functions {
            let err = default_wrapper(function).unwrap_err().to_string();
            assert!(err.contains(expected_message), "{}", err);
        }
    }

    #[test]
    fn wrapping_module() {
        let attrs = ShadowAttrs {
            namespace: Some("app".to_owned()),
        };
        let module: ItemMod = syn::parse_quote! {
            mod shims {
                const LIMIT: usize = 0;

                fn now() -> u64 { crate::clock::now() }

                #[shadow(namespace = "other")]
                fn mail(to: String) -> bool { crate::sys::mail(to) }

                fn len(s: &str) -> usize { s.len() }
            }
        };

        let wrapper = ModWrapper::new(&attrs, module).unwrap();
        let expected: ItemMod = syn::parse_quote! {
            mod shims {
                const LIMIT: usize = 0;

                #[interpose::shadow(namespace = "app")]
                fn now() -> u64 { crate::clock::now() }

                #[shadow(namespace = "other")]
                fn mail(to: String) -> bool { crate::sys::mail(to) }

                fn len(s: &str) -> usize { s.len() }
            }
        };
        assert_eq!(wrapper.module, expected, "{}", quote!(#wrapper));
    }

    #[test]
    fn wrapping_module_without_namespace() {
        let module: ItemMod = syn::parse_quote! {
            mod shims {
                fn now() -> u64 { crate::clock::now() }
            }
        };
        let wrapper = ModWrapper::new(&ShadowAttrs::default(), module).unwrap();
        let expected: ItemMod = syn::parse_quote! {
            mod shims {
                #[interpose::shadow]
                fn now() -> u64 { crate::clock::now() }
            }
        };
        assert_eq!(wrapper.module, expected, "{}", quote!(#wrapper));
    }

    #[test]
    fn wrapping_module_errors() {
        let module: ItemMod = syn::parse_quote!(mod shims;);
        let err = ModWrapper::new(&ShadowAttrs::default(), module)
            .unwrap_err()
            .to_string();
        assert!(err.contains("only inline modules"), "{}", err);
    }
}
