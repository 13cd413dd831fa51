mod result_class;

use proc_macro::TokenStream;
use result_class::result_class;
use syn::{ItemStruct, parse_macro_input};

/// Implements `ResultClass` for a struct composed around a `quarry::Row`.
///
/// The row field is the one marked `#[row]`, or else the only field whose
/// type is named `Row`. Every other field starts from `Default::default()`.
///
/// ```ignore
/// #[derive(ResultClass)]
/// struct User {
///     row: Row,
///     greeted: bool,
/// }
/// ```
#[proc_macro_derive(ResultClass, attributes(row))]
pub fn derive_result_class(input: TokenStream) -> TokenStream {
    let item: ItemStruct = parse_macro_input!(input as ItemStruct);
    result_class(&item)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
