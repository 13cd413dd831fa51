use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{Fields, Ident, ItemStruct, Type, spanned::Spanned};

fn is_row_type(ty: &Type) -> bool {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .is_some_and(|s| s.ident == "Row" && s.arguments.is_empty()),
        _ => false,
    }
}

/// Field holding the row: the one marked `#[row]`, else the only one of type `Row`.
fn row_field(item: &ItemStruct) -> syn::Result<Ident> {
    let Fields::Named(fields) = &item.fields else {
        return Err(syn::Error::new(
            item.span(),
            "ResultClass can only be derived for structs with named fields",
        ));
    };
    let marked: Vec<_> = fields
        .named
        .iter()
        .filter(|f| f.attrs.iter().any(|a| a.path().is_ident("row")))
        .collect();
    let candidates = if marked.is_empty() {
        fields.named.iter().filter(|f| is_row_type(&f.ty)).collect()
    } else {
        marked
    };
    match candidates.as_slice() {
        [field] => field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "The row field must be named")),
        [] => Err(syn::Error::new(
            item.ident.span(),
            format!(
                "`{}` has no field of type `Row`, mark the row field with #[row]",
                item.ident
            ),
        )),
        [_, second, ..] => Err(syn::Error::new(
            second.span(),
            "More than one row field, mark the one to use with #[row]",
        )),
    }
}

pub(crate) fn result_class(item: &ItemStruct) -> syn::Result<TokenStream> {
    let name = &item.ident;
    let row = row_field(item)?;
    let (impl_generics, ty_generics, where_clause) = item.generics.split_for_impl();
    let remaining = item
        .fields
        .iter()
        .filter_map(|f| f.ident.as_ref())
        .filter(|ident| **ident != row)
        .map(|ident| quote!(#ident: ::std::default::Default::default()));
    let row_ty = item
        .fields
        .iter()
        .find(|f| f.ident.as_ref() == Some(&row))
        .map(|f| f.ty.to_token_stream())
        .unwrap_or_else(|| quote!(::quarry::Row));
    Ok(quote! {
        impl #impl_generics ::quarry::ResultClass for #name #ty_generics #where_clause {
            fn from_row(row: ::quarry::Row) -> ::quarry::Result<Self> {
                let #row: #row_ty = row;
                Ok(Self {
                    #row,
                    #(#remaining,)*
                })
            }
            fn row(&self) -> &::quarry::Row {
                &self.#row
            }
            fn row_mut(&mut self) -> &mut ::quarry::Row {
                &mut self.#row
            }
            fn into_row(self) -> ::quarry::Row {
                self.#row
            }
        }
    })
}
