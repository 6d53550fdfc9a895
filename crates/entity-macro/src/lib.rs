//! `#[derive(Record)]` for helios-entity.
//!
//! Generates the `Record` implementation for a struct with named fields:
//! one `FieldDescriptor` per member in declaration order, plus index-based
//! accessors that convert through `FieldValue`.
//!
//! Supported attributes:
//!
//! | Attribute | Position | Effect |
//! |-----------|----------|--------|
//! | `#[wire(type_name = "...")]` | struct | name reported by `Record::TYPE_NAME` |
//! | `#[wire(rename = "...")]` | field | wire name override (`"@etag"`, `"gd:kind"`, `"text()"`) |
//! | `#[wire(immutable)]` | field | field may only be written by decoders |
//! | `#[wire(skip)]` | field | member is not bound to any wire key |

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Fields, LitStr, parse_macro_input};

#[proc_macro_derive(Record, attributes(wire))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_record(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<String>,
    immutable: bool,
    skip: bool,
}

fn parse_field_attrs(attrs: &[syn::Attribute]) -> syn::Result<FieldAttrs> {
    let mut parsed = FieldAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("wire") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let name: LitStr = meta.value()?.parse()?;
                if name.value().is_empty() {
                    return Err(meta.error("wire name must not be empty"));
                }
                parsed.rename = Some(name.value());
                Ok(())
            } else if meta.path.is_ident("immutable") {
                parsed.immutable = true;
                Ok(())
            } else if meta.path.is_ident("skip") {
                parsed.skip = true;
                Ok(())
            } else {
                Err(meta.error("unsupported wire attribute; expected `rename`, `immutable` or `skip`"))
            }
        })?;
    }
    Ok(parsed)
}

fn parse_type_name(input: &DeriveInput) -> syn::Result<String> {
    let mut type_name = input.ident.unraw().to_string();
    for attr in &input.attrs {
        if !attr.path().is_ident("wire") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("type_name") {
                let name: LitStr = meta.value()?.parse()?;
                type_name = name.value();
                Ok(())
            } else {
                Err(meta.error("unsupported wire attribute; expected `type_name`"))
            }
        })?;
    }
    Ok(type_name)
}

fn expand_record(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let type_name = parse_type_name(input)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            Fields::Unit => {
                return Ok(unit_record(input, &type_name));
            }
            Fields::Unnamed(_) => {
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

    let mut descriptors = Vec::new();
    let mut read_arms = Vec::new();
    let mut write_arms = Vec::new();

    for field in fields {
        let attrs = parse_field_attrs(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = &field.ident else {
            continue;
        };
        let ty = &field.ty;
        let member = ident.unraw().to_string();
        let wire_name = attrs.rename.unwrap_or_else(|| member.clone());
        let immutable = attrs.immutable;
        let index = descriptors.len();

        descriptors.push(quote! {
            ::helios_entity::FieldDescriptor::new::<#ty>(#member, #wire_name, #immutable)
        });
        read_arms.push(quote! {
            #index => ::helios_entity::FieldValue::to_value(&self.#ident),
        });
        write_arms.push(quote! {
            #index => {
                self.#ident = <#ty as ::helios_entity::FieldValue>::from_value(value)?;
                ::std::result::Result::Ok(())
            }
        });
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::helios_entity::Record for #name #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;

            fn fields() -> ::std::vec::Vec<::helios_entity::FieldDescriptor> {
                ::std::vec![#(#descriptors),*]
            }

            #[allow(unreachable_patterns)]
            fn read_field(&self, index: usize) -> ::helios_entity::Value {
                match index {
                    #(#read_arms)*
                    _ => ::helios_entity::Value::Null,
                }
            }

            #[allow(unused_variables, unreachable_patterns)]
            fn write_field(
                &mut self,
                index: usize,
                value: ::helios_entity::Value,
            ) -> ::std::result::Result<(), ::helios_entity::ValueError> {
                match index {
                    #(#write_arms)*
                    _ => ::std::result::Result::Err(::helios_entity::ValueError::new(
                        "declared field",
                        ::std::format!("index {}", index),
                    )),
                }
            }
        }
    })
}

fn unit_record(input: &DeriveInput, type_name: &str) -> TokenStream2 {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    quote! {
        impl #impl_generics ::helios_entity::Record for #name #ty_generics #where_clause {
            const TYPE_NAME: &'static str = #type_name;

            fn fields() -> ::std::vec::Vec<::helios_entity::FieldDescriptor> {
                ::std::vec::Vec::new()
            }

            fn read_field(&self, _index: usize) -> ::helios_entity::Value {
                ::helios_entity::Value::Null
            }

            fn write_field(
                &mut self,
                index: usize,
                _value: ::helios_entity::Value,
            ) -> ::std::result::Result<(), ::helios_entity::ValueError> {
                ::std::result::Result::Err(::helios_entity::ValueError::new(
                    "declared field",
                    ::std::format!("index {}", index),
                ))
            }
        }
    }
}
