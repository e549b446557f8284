//! Derive macro for `Model`
//!
//! Emits a compile-time descriptor table instead of relying on runtime
//! introspection: every persistable field gets an entry (name, optional column
//! override, update-on-duplicate flag), a name-dispatched getter and setter arm,
//! and a typed column constant.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields};

use crate::attributes::{self, FieldRole};
use crate::utils::{self, Wrapper};

pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let type_name = struct_name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(syn::DataStruct {
            fields: Fields::Named(fields),
            ..
        }) => &fields.named,
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Model can only be derived for structs with named fields",
            ));
        }
    };

    let table_name = match attributes::extract_table_name(&input.attrs) {
        Some(name) => quote! { ::core::option::Option::Some(#name) },
        None => quote! { ::core::option::Option::None },
    };

    let mut primary_key: Option<String> = None;
    let mut descriptors = Vec::new();
    let mut join_descriptors = Vec::new();
    let mut getters = Vec::new();
    let mut setters = Vec::new();
    let mut joiners = Vec::new();
    let mut constants = Vec::new();

    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let name = ident.to_string();
        let attrs = attributes::parse_column_attributes(field);

        match attrs.role() {
            FieldRole::Skipped => {}
            FieldRole::Join => {
                let (shape, assign) = match utils::wrapper_of(&field.ty) {
                    Wrapper::Vec => (
                        quote! { ::quarry::JoinShape::Many },
                        quote! { self.#ident = ::quarry::model::join_many(rows, cache); },
                    ),
                    Wrapper::Option => (
                        quote! { ::quarry::JoinShape::One },
                        quote! { self.#ident = ::quarry::model::join_one(rows, cache); },
                    ),
                    Wrapper::Bare => (
                        quote! { ::quarry::JoinShape::One },
                        quote! {
                            self.#ident = ::quarry::model::join_one(rows, cache).unwrap_or_default();
                        },
                    ),
                };
                join_descriptors.push(quote! {
                    ::quarry::JoinFieldDescriptor { name: #name, shape: #shape }
                });
                joiners.push(quote! {
                    #name => {
                        #assign
                        ::core::result::Result::Ok(())
                    }
                });
            }
            FieldRole::Persistable => {
                if attrs.is_primary_key {
                    if primary_key.is_some() {
                        return Err(syn::Error::new_spanned(
                            field,
                            "Model supports a single #[primary_key] field",
                        ));
                    }
                    primary_key = Some(name.clone());
                }
                let column = match &attrs.column_name {
                    Some(column) => quote! { ::core::option::Option::Some(#column) },
                    None => quote! { ::core::option::Option::None },
                };
                let update_on_duplicate = attrs.update_on_duplicate;
                descriptors.push(quote! {
                    ::quarry::FieldDescriptor {
                        name: #name,
                        column: #column,
                        update_on_duplicate: #update_on_duplicate,
                    }
                });
                getters.push(quote! {
                    #name => ::core::option::Option::Some(::quarry::ColumnValue::to_value(&self.#ident)),
                });
                setters.push(quote! {
                    #name => {
                        self.#ident = ::quarry::ColumnValue::from_value(value)?;
                        ::core::result::Result::Ok(())
                    }
                });
                let constant = format_ident!("{}", utils::screaming_snake_case(&name));
                constants.push(quote! {
                    pub const #constant: ::quarry::Col<#struct_name #ty_generics> = ::quarry::Col::new(#name);
                });
            }
        }
    }

    let primary_key = match primary_key {
        Some(name) => quote! { ::core::option::Option::Some(#name) },
        None => quote! { ::core::option::Option::None },
    };

    Ok(quote! {
        impl #impl_generics ::quarry::Model for #struct_name #ty_generics #where_clause {
            const DESCRIPTOR: ::quarry::ModelDescriptor = ::quarry::ModelDescriptor {
                type_name: #type_name,
                table_name: #table_name,
                primary_key: #primary_key,
                fields: &[#(#descriptors),*],
                joins: &[#(#join_descriptors),*],
            };

            fn get(&self, field: &str) -> ::core::option::Option<::quarry::Value> {
                match field {
                    #(#getters)*
                    _ => ::core::option::Option::None,
                }
            }

            fn set(&mut self, field: &str, value: ::quarry::Value) -> ::quarry::Result<()> {
                match field {
                    #(#setters)*
                    _ => ::core::result::Result::Err(::quarry::model::unknown_field(#type_name, field)),
                }
            }

            #[allow(unused_variables)]
            fn set_joined(
                &mut self,
                field: &str,
                rows: ::std::vec::Vec<::quarry::Row>,
                cache: &::quarry::MetadataCache,
            ) -> ::quarry::Result<()> {
                match field {
                    #(#joiners)*
                    _ => ::core::result::Result::Err(::quarry::model::invalid_join(#type_name, field)),
                }
            }
        }

        impl #impl_generics ::quarry::FromRow for #struct_name #ty_generics #where_clause {
            fn from_row(row: &::quarry::Row, cache: &::quarry::MetadataCache) -> ::quarry::Result<Self> {
                ::core::result::Result::Ok(::quarry::model::map_row::<Self>(row, cache))
            }
        }

        impl #impl_generics #struct_name #ty_generics #where_clause {
            #(#constants)*
        }
    })
}
