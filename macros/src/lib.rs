use syn::DeriveInput;

mod derive_value;

#[proc_macro_derive(Value, attributes(value))]
pub fn derive_value(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    derive_value::derive_value(input)
        .unwrap_or_else(|err| err.into_compile_error())
        .into()
}
