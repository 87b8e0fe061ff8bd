use darling::FromDeriveInput;
use proc_macro2::{Ident, TokenStream};
use quote::{format_ident, quote};
use syn::{DeriveInput, Error};

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(value), supports(struct_newtype, struct_named))]
struct ValueOptions {
    ident: Ident,
    generics: syn::Generics,
    /// Slot kind backing the type: `scalar`, `vector` or `matrix`.
    kind: String,
}

pub fn derive_value(input: DeriveInput) -> Result<TokenStream, Error> {
    let options = ValueOptions::from_derive_input(&input)?;
    let struct_ident = &options.ident;

    if !options.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &options.generics,
            "value types cannot be generic",
        ));
    }

    let variant = kind_variant(&options.kind).ok_or_else(|| {
        Error::new_spanned(
            struct_ident,
            format!(
                "unknown value kind '{}' (expected one of: scalar, vector, matrix)",
                options.kind
            ),
        )
    })?;

    let result = quote! {
        impl ::lazymath::value::Value for #struct_ident {
            const KIND: ::lazymath::value::ValueKind = ::lazymath::value::ValueKind::#variant;
        }

        const _: () = ::core::assert!(
            ::core::mem::size_of::<#struct_ident>()
                == ::lazymath::value::ValueKind::#variant.width() * ::core::mem::size_of::<f32>(),
            "size of value type does not match the width of its value kind"
        );
    };
    Ok(result)
}

fn kind_variant(kind: &str) -> Option<Ident> {
    let variant = match kind {
        "scalar" => "Scalar",
        "vector" => "Vector",
        "matrix" => "Matrix",
        _ => return None,
    };
    Some(format_ident!("{variant}"))
}
