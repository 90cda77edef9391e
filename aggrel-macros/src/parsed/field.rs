use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, quote};
use syn::{Error, Field, GenericArgument, Ident, LitStr, PathArguments, Result, Type, spanned::Spanned};

use super::serde_names::{self, RenameRule};

pub(crate) struct ParsedField {
    ident: Ident,
    /// Rust name without a raw-identifier prefix.
    property: String,
    document_field: String,
    roles: Vec<Role>,
}

enum Role {
    PrimaryKey,
    Parent,
    LocalKey { link: String, related: RelatedElement },
    ForeignKey { link: String, related: RelatedElement },
}

/// Element type of a relationship property: `Option<T>` and `T` are single,
/// `Vec<T>` and `Option<Vec<T>>` are collections.
struct RelatedElement {
    ty: Type,
    collection: bool,
}

impl RelatedElement {
    fn classify(ty: &Type) -> Self {
        let inner = unwrap_generic(ty, "Option").unwrap_or(ty);
        match unwrap_generic(inner, "Vec") {
            Some(element) => Self {
                ty: element.clone(),
                collection: true,
            },
            None => Self {
                ty: inner.clone(),
                collection: false,
            },
        }
    }
}

impl ParsedField {
    pub(crate) fn from_field(field: &Field, rule: Option<RenameRule>) -> Result<Self> {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| Error::new(field.span(), "Record requires named fields"))?;
        let property = ident.to_string().trim_start_matches("r#").to_string();

        let document_field = match serde_names::field_rename(&field.attrs)? {
            Some(rename) => rename,
            None => rule.map_or_else(|| property.clone(), |rule| rule.apply(&property)),
        };

        let mut roles = Vec::new();
        for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("aggrel")) {
            attr.parse_nested_meta(|meta| {
                let role = if meta.path.is_ident("id") {
                    Role::PrimaryKey
                } else if meta.path.is_ident("parent") {
                    Role::Parent
                } else if meta.path.is_ident("local_key") {
                    Role::LocalKey {
                        link: link_path(meta.value()?.parse()?)?,
                        related: RelatedElement::classify(&field.ty),
                    }
                } else if meta.path.is_ident("foreign_key") {
                    Role::ForeignKey {
                        link: link_path(meta.value()?.parse()?)?,
                        related: RelatedElement::classify(&field.ty),
                    }
                } else {
                    return Err(meta.error("unsupported aggrel field attribute; expected id, parent, local_key or foreign_key"));
                };
                if roles.iter().any(|seen| std::mem::discriminant(seen) == std::mem::discriminant(&role)) {
                    return Err(meta.error("role declared twice on the same field"));
                }
                roles.push(role);
                Ok(())
            })?;
        }

        Ok(Self {
            ident,
            property,
            document_field,
            roles,
        })
    }

    /// One `.field(...)` call per declared role.
    pub(crate) fn emit(&self, record: &Ident) -> TokenStream2 {
        let member = &self.ident;
        let property = &self.property;
        let document_field = &self.document_field;

        self.roles
            .iter()
            .map(|role| match role {
                Role::PrimaryKey => quote! {
                    .field(::aggrel::types::FieldSchema::primary_key(
                        #property,
                        #document_field,
                        {
                            fn get(record: &#record) -> ::core::option::Option<&str> {
                                ::aggrel::types::KeyValue::key(&record.#member)
                            }
                            get
                        },
                        {
                            fn set(record: &mut #record, key: ::std::string::String) {
                                ::aggrel::types::KeyValue::assign(&mut record.#member, key)
                            }
                            set
                        },
                    ))
                },
                Role::Parent => quote! {
                    .field(::aggrel::types::FieldSchema::parent_reference(
                        #property,
                        #document_field,
                        {
                            fn get(record: &#record) -> ::core::option::Option<&str> {
                                ::aggrel::types::KeyValue::key(&record.#member)
                            }
                            get
                        },
                    ))
                },
                Role::LocalKey { link, related } => {
                    let related = related.emit();
                    quote! {
                        .field(::aggrel::types::FieldSchema::local_key(#property, #document_field, #link, #related))
                    }
                }
                Role::ForeignKey { link, related } => {
                    let related = related.emit();
                    quote! {
                        .field(::aggrel::types::FieldSchema::foreign_key(#property, #document_field, #link, #related))
                    }
                }
            })
            .collect()
    }
}

impl RelatedElement {
    fn emit(&self) -> TokenStream2 {
        let ty = &self.ty;
        let type_name = ty.to_token_stream().to_string().replace(' ', "");
        let cardinality = if self.collection {
            quote!(::aggrel::types::Cardinality::Collection)
        } else {
            quote!(::aggrel::types::Cardinality::Single)
        };
        quote! {
            ::aggrel::types::RelatedType::new(#type_name, #cardinality, ::aggrel::metadata::related_target::<#ty>)
        }
    }
}

fn link_path(lit: LitStr) -> Result<String> {
    let link = lit.value();
    if link.trim().is_empty() {
        return Err(Error::new(lit.span(), "linking field path must not be empty"));
    }
    Ok(link)
}

fn unwrap_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) => args.args.first().and_then(|arg| match arg {
            GenericArgument::Type(inner) => Some(inner),
            _ => None,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use syn::parse_quote;

    use super::*;

    fn element(ty: Type) -> (String, bool) {
        let related = RelatedElement::classify(&ty);
        (related.ty.to_token_stream().to_string(), related.collection)
    }

    #[test]
    fn cardinality_follows_the_declared_type() {
        assert_eq!(element(parse_quote!(Option<User>)), ("User".into(), false));
        assert_eq!(element(parse_quote!(User)), ("User".into(), false));
        assert_eq!(element(parse_quote!(Vec<Detail>)), ("Detail".into(), true));
        assert_eq!(element(parse_quote!(Option<Vec<Detail>>)), ("Detail".into(), true));
    }

    #[test]
    fn document_field_honours_serde() {
        let field: Field = parse_quote! {
            #[aggrel(id)]
            #[serde(rename = "_id")]
            pub id: String
        };
        let parsed = ParsedField::from_field(&field, Some(RenameRule::Camel)).unwrap();
        assert_eq!(parsed.document_field, "_id");

        let field: Field = parse_quote!(#[aggrel(parent)] parent_id: Option<String>);
        let parsed = ParsedField::from_field(&field, Some(RenameRule::Camel)).unwrap();
        assert_eq!(parsed.document_field, "parentId");
        assert_eq!(parsed.property, "parent_id");
    }

    #[test]
    fn one_field_may_carry_several_roles() {
        let field: Field = parse_quote!(#[aggrel(local_key = "user_id", foreign_key = "owner_id")] user: Option<User>);
        let parsed = ParsedField::from_field(&field, None).unwrap();
        assert_eq!(parsed.roles.len(), 2);
    }

    #[test]
    fn unknown_and_repeated_keys_are_rejected() {
        let field: Field = parse_quote!(#[aggrel(index)] name: String);
        assert!(ParsedField::from_field(&field, None).is_err());

        let field: Field = parse_quote!(#[aggrel(id, id)] id: String);
        assert!(ParsedField::from_field(&field, None).is_err());

        let field: Field = parse_quote!(#[aggrel(local_key = "")] user: Option<User>);
        assert!(ParsedField::from_field(&field, None).is_err());
    }
}
