//! Misc utils.

use proc_macro2::Span;
use syn::{
    spanned::Spanned,
    visit::{self, Visit},
    Attribute, Lifetime, NestedMeta, Signature, TypeImplTrait, TypeReference,
};

pub(crate) fn find_meta_attrs(
    name: &str,
    cr: Option<&str>,
    args: &[Attribute],
) -> Option<NestedMeta> {
    args.iter()
        .filter_map(|attr| attr.parse_meta().ok())
        .find(|meta| match_path(meta.path(), name, cr))
        .map(NestedMeta::from)
}

fn match_path(path: &syn::Path, name: &str, cr: Option<&str>) -> bool {
    if path.is_ident(name) {
        return true;
    } else if let Some(cr) = cr {
        if path.segments.len() == 2 {
            let crate_segment = &path.segments[0];
            let name_segment = &path.segments[1];
            return crate_segment.ident == cr && name_segment.ident == name;
        }
    }
    false
}

/// Finds the first borrow in a signature that is not `'static`.
#[derive(Debug, Default)]
struct BorrowScanner {
    borrow_span: Option<Span>,
}

impl BorrowScanner {
    fn record(&mut self, span: Span) {
        if self.borrow_span.is_none() {
            self.borrow_span = Some(span);
        }
    }
}

impl<'ast> Visit<'ast> for BorrowScanner {
    fn visit_lifetime(&mut self, lifetime: &'ast Lifetime) {
        if lifetime.ident != "static" {
            self.record(lifetime.span());
        }
    }

    fn visit_type_reference(&mut self, ty_ref: &'ast TypeReference) {
        if ty_ref.lifetime.is_none() {
            self.record(ty_ref.and_token.span());
        }
        // Recurse to visit embedded lifetimes (e.g., in `&'static Cow<'_, [u8]>`).
        visit::visit_type_reference(self, ty_ref);
    }

    fn visit_type_impl_trait(&mut self, ty: &'ast TypeImplTrait) {
        self.record(ty.impl_token.span());
    }

    fn visit_type_bare_fn(&mut self, _: &'ast syn::TypeBareFn) {
        // Do not recurse into bare functions since they have separate lifetime elision scope.
    }
}

/// Returns the span of a non-`'static` borrow in args or the return type, if any.
pub(crate) fn borrow_span(sig: &Signature) -> Option<Span> {
    let mut scanner = BorrowScanner::default();
    for input in &sig.inputs {
        scanner.visit_fn_arg(input);
    }
    scanner.visit_return_type(&sig.output);
    scanner.borrow_span
}
