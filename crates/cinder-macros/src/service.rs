use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{Ident, ItemFn, ReturnType, parse_macro_input};

/// Implementation of the `#[service]` attribute macro.
///
/// Leaves the decorated factory unchanged and appends a
/// `#[::cinder_core::linkme::distributed_slice]` static that adds it to
/// `cinder_core::SERVICE_DESCRIPTORS`.
pub fn service(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            Span::call_site(),
            "#[service] takes no arguments, configure the descriptor in the function body",
        )
        .into_compile_error()
        .into();
    }

    let func = parse_macro_input!(item as ItemFn);
    let sig = &func.sig;

    if let Some(asyncness) = &sig.asyncness {
        return syn::Error::new_spanned(asyncness, "service factories must not be async")
            .into_compile_error()
            .into();
    }
    if !sig.inputs.is_empty() {
        return syn::Error::new_spanned(&sig.inputs, "service factories take no arguments")
            .into_compile_error()
            .into();
    }
    if !sig.generics.params.is_empty() {
        return syn::Error::new_spanned(&sig.generics, "service factories cannot be generic")
            .into_compile_error()
            .into();
    }
    if matches!(sig.output, ReturnType::Default) {
        return syn::Error::new_spanned(sig, "service factories must return a ServiceDescriptor")
            .into_compile_error()
            .into();
    }

    let fn_name = &sig.ident;
    let static_name = Ident::new(
        &format!("_SERVICE_DESCRIPTOR_{}", fn_name.to_string().to_uppercase()),
        Span::call_site(),
    );

    quote! {
        #func

        #[::cinder_core::linkme::distributed_slice(::cinder_core::SERVICE_DESCRIPTORS)]
        #[linkme(crate = ::cinder_core::linkme)]
        static #static_name: ::cinder_core::DescriptorFactory = #fn_name;
    }
    .into()
}
