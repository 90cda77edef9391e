use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Error, Fields, Ident, LitStr, Result, spanned::Spanned};

use super::{field::ParsedField, serde_names};

pub(crate) struct ParsedRecord {
    name: Ident,
    collection: Option<LitStr>,
    fields: Vec<ParsedField>,
}

impl ParsedRecord {
    pub(crate) fn from_input(input: &DeriveInput) -> Result<Self> {
        if !input.generics.params.is_empty() {
            return Err(Error::new(input.generics.span(), "Record cannot be derived for generic types"));
        }

        let mut collection: Option<LitStr> = None;
        for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("aggrel")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("collection") {
                    if collection.is_some() {
                        return Err(meta.error("collection declared twice"));
                    }
                    let value: LitStr = meta.value()?.parse()?;
                    if value.value().trim().is_empty() {
                        return Err(Error::new(value.span(), "collection name must not be empty"));
                    }
                    collection = Some(value);
                    Ok(())
                } else {
                    Err(meta.error("unsupported aggrel container attribute; expected collection"))
                }
            })?;
        }

        let rule = serde_names::container_rule(&input.attrs)?;
        let fields = match &input.data {
            Data::Struct(data) => match &data.fields {
                Fields::Named(named) => named
                    .named
                    .iter()
                    .map(|field| ParsedField::from_field(field, rule))
                    .collect::<Result<Vec<_>>>()?,
                _ => return Err(Error::new(input.ident.span(), "Record requires named fields")),
            },
            _ => return Err(Error::new(input.ident.span(), "Record can only be derived for structs")),
        };

        Ok(Self {
            name: input.ident.clone(),
            collection,
            fields,
        })
    }

    pub(crate) fn emit(&self) -> TokenStream2 {
        let name = &self.name;
        let collection = match &self.collection {
            Some(collection) => quote!(::core::option::Option::Some(#collection)),
            None => quote!(::core::option::Option::None),
        };
        let fields = self.fields.iter().map(|field| field.emit(name));

        quote! {
            impl ::aggrel::types::Record for #name {
                fn schema() -> ::aggrel::types::TypeSchema<Self> {
                    ::aggrel::types::TypeSchema::new(::core::stringify!(#name), #collection)
                        #(#fields)*
                }
            }
        }
    }
}
