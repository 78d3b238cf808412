//! TABX Derive: procedural macros for TABX record tables.
//!
//! Provides `#[derive(Record)]`, which generates the static key layout of a
//! record type and typed access to its key fields.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::{Data, DeriveInput, Fields, Ident, LitInt, LitStr, Type, parse_macro_input};

/// Derive macro implementing `tabx_core::Record`.
///
/// # Example
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize, Record)]
/// #[tabx(type_name = "bank.Account", table_id = 3)]
/// #[tabx(primary_key(fields = "id", auto_increment))]
/// #[tabx(index(id = 1, fields = "owner,currency"))]
/// #[tabx(index(id = 2, fields = "number", unique))]
/// pub struct Account {
///     pub id: u64,
///     pub owner: String,
///     pub currency: String,
///     pub number: String,
///     pub balance: u64,
/// }
/// ```
///
/// Generates:
/// - `Record::TYPE_NAME` (defaults to the struct name)
/// - `Record::descriptor()`: primary key and index layout in `static`s
/// - `Record::key_part()` for every key field
/// - `AutoIncrement` when the primary key is marked `auto_increment`
#[proc_macro_derive(Record, attributes(tabx))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

struct IndexAttr {
    id: u32,
    fields: Vec<String>,
    unique: bool,
    span: Span,
}

#[derive(Default)]
struct RecordAttrs {
    type_name: Option<String>,
    table_id: Option<u32>,
    primary_key: Option<(Vec<String>, Span)>,
    auto_increment: bool,
    indexes: Vec<IndexAttr>,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Record cannot be derived for generic types",
        ));
    }
    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Record can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Record can only be derived for structs",
            ));
        }
    };

    let attrs = parse_attrs(input)?;
    let type_name = attrs.type_name.clone().unwrap_or_else(|| name.to_string());
    let table_id = attrs.table_id.ok_or_else(|| {
        syn::Error::new_spanned(name, "missing #[tabx(table_id = ...)]")
    })?;
    let (pk_fields, pk_span) = attrs.primary_key.clone().ok_or_else(|| {
        syn::Error::new_spanned(name, "missing #[tabx(primary_key(fields = \"...\"))]")
    })?;

    let field_type = |field: &str, span: Span| -> syn::Result<&Type> {
        fields
            .iter()
            .find(|f| f.ident.as_ref().is_some_and(|ident| ident == field))
            .map(|f| &f.ty)
            .ok_or_else(|| syn::Error::new(span, format!("`{name}` has no field `{field}`")))
    };
    let field_specs = |names: &[String], span: Span| -> syn::Result<Vec<TokenStream2>> {
        names
            .iter()
            .map(|field| {
                let ty = field_type(field, span)?;
                Ok(quote! {
                    ::tabx_core::FieldSpec {
                        name: #field,
                        kind: <#ty as ::tabx_core::KeyField>::KIND,
                    }
                })
            })
            .collect()
    };

    // Primary key
    let pk_specs = field_specs(&pk_fields, pk_span)?;
    let pk_len = pk_specs.len();

    // Indexes
    let mut index_statics = Vec::new();
    let mut index_descriptors = Vec::new();
    let mut seen_ids = Vec::new();
    for index in &attrs.indexes {
        if seen_ids.contains(&index.id) {
            return Err(syn::Error::new(
                index.span,
                format!("duplicate index id {}", index.id),
            ));
        }
        seen_ids.push(index.id);
        let specs = field_specs(&index.fields, index.span)?;
        let len = specs.len();
        let ident = format_ident!("INDEX_{}_FIELDS", index.id);
        let id = index.id;
        let unique = index.unique;
        index_statics.push(quote! {
            static #ident: [::tabx_core::FieldSpec; #len] = [#(#specs),*];
        });
        index_descriptors.push(quote! {
            ::tabx_core::IndexDescriptor {
                id: #id,
                fields: &#ident,
                unique: #unique,
            }
        });
    }
    let index_len = index_descriptors.len();

    // Auto-increment
    let (auto_increment, auto_impl) = if attrs.auto_increment {
        let [field] = pk_fields.as_slice() else {
            return Err(syn::Error::new(
                pk_span,
                "auto_increment needs a single primary key field",
            ));
        };
        let ident = Ident::new(field, pk_span);
        (
            quote! { ::core::option::Option::Some(#field) },
            quote! {
                impl ::tabx_core::AutoIncrement for #name {
                    fn auto_increment_id(&self) -> u64 {
                        self.#ident
                    }

                    fn set_auto_increment_id(&mut self, id: u64) {
                        self.#ident = id;
                    }
                }
            },
        )
    } else {
        (quote! { ::core::option::Option::None }, TokenStream2::new())
    };

    // key_part arms over every key field, once each
    let mut key_fields: Vec<&String> = Vec::new();
    for field in pk_fields.iter().chain(attrs.indexes.iter().flat_map(|i| &i.fields)) {
        if !key_fields.contains(&field) {
            key_fields.push(field);
        }
    }
    let key_arms = key_fields.iter().map(|field| {
        let ident = Ident::new(field, Span::call_site());
        quote! {
            #field => ::tabx_core::KeyField::key_part(&self.#ident),
        }
    });

    Ok(quote! {
        impl ::tabx_core::Record for #name {
            const TYPE_NAME: &'static str = #type_name;

            fn descriptor() -> &'static ::tabx_core::TableDescriptor {
                static PRIMARY_KEY: [::tabx_core::FieldSpec; #pk_len] = [#(#pk_specs),*];
                #(#index_statics)*
                static INDEXES: [::tabx_core::IndexDescriptor; #index_len] = [#(#index_descriptors),*];
                static DESCRIPTOR: ::tabx_core::TableDescriptor = ::tabx_core::TableDescriptor {
                    table_id: #table_id,
                    primary_key: &PRIMARY_KEY,
                    indexes: &INDEXES,
                    auto_increment: #auto_increment,
                };
                &DESCRIPTOR
            }

            fn key_part(&self, field: &str) -> ::core::option::Option<::tabx_core::KeyPart> {
                match field {
                    #(#key_arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        #auto_impl
    })
}

fn parse_attrs(input: &DeriveInput) -> syn::Result<RecordAttrs> {
    let mut attrs = RecordAttrs::default();
    for attr in &input.attrs {
        if !attr.path().is_ident("tabx") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("type_name") {
                let value: LitStr = meta.value()?.parse()?;
                attrs.type_name = Some(value.value());
                Ok(())
            } else if meta.path.is_ident("table_id") {
                let value: LitInt = meta.value()?.parse()?;
                attrs.table_id = Some(value.base10_parse()?);
                Ok(())
            } else if meta.path.is_ident("primary_key") {
                if attrs.primary_key.is_some() {
                    return Err(meta.error("duplicate primary_key"));
                }
                let mut fields = None;
                meta.parse_nested_meta(|inner| {
                    if inner.path.is_ident("fields") {
                        let value: LitStr = inner.value()?.parse()?;
                        fields = Some((split_fields(&value)?, value.span()));
                        Ok(())
                    } else if inner.path.is_ident("auto_increment") {
                        attrs.auto_increment = true;
                        Ok(())
                    } else {
                        Err(inner.error("expected `fields` or `auto_increment`"))
                    }
                })?;
                attrs.primary_key =
                    Some(fields.ok_or_else(|| meta.error("primary_key needs `fields = \"...\"`"))?);
                Ok(())
            } else if meta.path.is_ident("index") {
                let mut id = None;
                let mut fields = None;
                let mut unique = false;
                meta.parse_nested_meta(|inner| {
                    if inner.path.is_ident("id") {
                        let value: LitInt = inner.value()?.parse()?;
                        id = Some(value.base10_parse::<u32>()?);
                        Ok(())
                    } else if inner.path.is_ident("fields") {
                        let value: LitStr = inner.value()?.parse()?;
                        fields = Some((split_fields(&value)?, value.span()));
                        Ok(())
                    } else if inner.path.is_ident("unique") {
                        unique = true;
                        Ok(())
                    } else {
                        Err(inner.error("expected `id`, `fields` or `unique`"))
                    }
                })?;
                let id = id.ok_or_else(|| meta.error("index needs `id = ...`"))?;
                if id == 0 || id == u32::MAX {
                    return Err(meta.error(format!("index id {id} is reserved")));
                }
                let (fields, span) =
                    fields.ok_or_else(|| meta.error("index needs `fields = \"...\"`"))?;
                attrs.indexes.push(IndexAttr {
                    id,
                    fields,
                    unique,
                    span,
                });
                Ok(())
            } else {
                Err(meta.error("unknown tabx attribute"))
            }
        })?;
    }
    Ok(attrs)
}

/// `"a, b"` → `["a", "b"]`.
fn split_fields(value: &LitStr) -> syn::Result<Vec<String>> {
    let fields: Vec<String> = value
        .value()
        .split(',')
        .map(|f| f.trim().to_string())
        .collect();
    if fields.iter().any(String::is_empty) {
        return Err(syn::Error::new(value.span(), "empty field name"));
    }
    Ok(fields)
}
