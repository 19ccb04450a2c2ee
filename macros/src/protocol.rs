//! Codegen for the wire `Encode`/`Decode` derives.
//!
//! A derived struct reads and writes its fields in declaration order.
//! A derived enum is prefixed with a discriminant (`varint` or `byte`)
//! selecting the variant. Individual fields opt into the non-default
//! scalar encodings of this protocol revision via `#[encoding(...)]`:
//! `varint`, `angle`, `bool_prefixed` (an `Option` behind a presence
//! flag), and `length_prefix = "varint" | "inferred"` for lists.

use darling::{FromDeriveInput, FromField, FromMeta, FromVariant};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DataEnum, DeriveInput, Field, Fields, FieldsNamed};

#[derive(Default, FromField)]
#[darling(attributes(encoding), forward_attrs(allow, doc, cfg))]
#[darling(default)]
struct FieldAttrs {
    varint: bool,
    angle: bool,
    bool_prefixed: bool,
    length_prefix: Option<LengthPrefix>,
}

#[derive(FromMeta)]
enum LengthPrefix {
    #[darling(rename = "varint")]
    VarInt,
    #[darling(rename = "inferred")]
    Inferred,
}

#[derive(FromDeriveInput)]
#[darling(attributes(encoding), forward_attrs(allow, doc, cfg))]
struct EnumAttrs {
    discriminant: Discriminant,
}

#[derive(FromMeta)]
enum Discriminant {
    #[darling(rename = "varint")]
    VarInt,
    #[darling(rename = "byte")]
    Byte,
}

#[derive(FromVariant)]
#[darling(attributes(encoding), forward_attrs(allow, doc, cfg))]
struct VariantAttrs {
    id: i32,
}

/// How a single field travels over the wire. Resolved once from the
/// field's attributes, then used by both derives.
enum FieldCodec {
    /// Delegate to the type's own `Encode`/`Decode` impls.
    Nested,
    VarInt,
    Angle,
    /// `Option<T>` behind a boolean presence flag.
    BoolPrefixed,
    /// `Vec<T>` with a varint element count.
    CountedList,
    /// `Vec<T>` filling the remainder of the packet. Only sound for
    /// the final field.
    RemainderList,
}

impl FieldCodec {
    fn resolve(field: &Field) -> syn::Result<Self> {
        let attrs = FieldAttrs::from_field(field)?;
        let picked = usize::from(attrs.varint)
            + usize::from(attrs.angle)
            + usize::from(attrs.bool_prefixed)
            + usize::from(attrs.length_prefix.is_some());
        if picked > 1 {
            return Err(syn::Error::new_spanned(
                field,
                "conflicting #[encoding(..)] options on one field",
            ));
        }

        Ok(if attrs.varint {
            Self::VarInt
        } else if attrs.angle {
            Self::Angle
        } else if attrs.bool_prefixed {
            Self::BoolPrefixed
        } else {
            match attrs.length_prefix {
                Some(LengthPrefix::VarInt) => Self::CountedList,
                Some(LengthPrefix::Inferred) => Self::RemainderList,
                None => Self::Nested,
            }
        })
    }

    /// Statements writing the field, where `value` evaluates to a
    /// reference to it.
    fn encode(&self, value: &TokenStream) -> TokenStream {
        match self {
            Self::Nested => quote! {
                crate::protocol::Encode::encode(#value, encoder);
            },
            Self::VarInt => quote! {
                encoder.write_var_int((*#value).try_into().unwrap_or(i32::MAX));
            },
            Self::Angle => quote! {
                encoder.write_angle(*#value);
            },
            Self::BoolPrefixed => quote! {
                encoder.write_bool(#value.is_some());
                if let Some(present) = #value.as_ref() {
                    crate::protocol::Encode::encode(present, encoder);
                }
            },
            Self::CountedList => quote! {
                encoder.write_var_int(#value.len().try_into().unwrap_or(i32::MAX));
                for item in #value.iter() {
                    crate::protocol::Encode::encode(item, encoder);
                }
            },
            Self::RemainderList => quote! {
                for item in #value.iter() {
                    crate::protocol::Encode::encode(item, encoder);
                }
            },
        }
    }

    /// An expression producing the decoded field value.
    fn decode(&self) -> TokenStream {
        match self {
            Self::Nested => quote! { crate::protocol::Decode::decode(decoder)? },
            Self::VarInt => quote! { decoder.read_var_int()?.try_into()? },
            Self::Angle => quote! { decoder.read_angle()? },
            Self::BoolPrefixed => quote! {
                if decoder.read_bool()? {
                    Some(crate::protocol::Decode::decode(decoder)?)
                } else {
                    None
                }
            },
            Self::CountedList => quote! {{
                let count = decoder.read_var_int()?;
                let mut items = Vec::new();
                for _ in 0..count {
                    items.push(crate::protocol::Decode::decode(decoder)?);
                }
                items
            }},
            Self::RemainderList => quote! {{
                let mut items = Vec::new();
                while !decoder.is_finished() {
                    items.push(crate::protocol::Decode::decode(decoder)?);
                }
                items
            }},
        }
    }
}

pub fn derive_encode_on(input: &DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let body = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => {
                let writes = named
                    .named
                    .iter()
                    .map(|field| {
                        let name = field.ident.as_ref().unwrap();
                        Ok(FieldCodec::resolve(field)?.encode(&quote!((&self.#name))))
                    })
                    .collect::<syn::Result<Vec<_>>>()?;
                quote! { #(#writes)* }
            }
            Fields::Unit => quote! {},
            Fields::Unnamed(unnamed) => {
                return Err(syn::Error::new_spanned(
                    unnamed,
                    "packet structs use named fields",
                ))
            }
        },
        Data::Enum(data) => {
            let attrs = EnumAttrs::from_derive_input(input)?;
            let arms = data
                .variants
                .iter()
                .map(|variant| encode_variant_arm(variant, &attrs.discriminant))
                .collect::<syn::Result<Vec<_>>>()?;
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Union(data) => {
            return Err(syn::Error::new_spanned(
                data.union_token,
                "wire packets cannot be unions",
            ))
        }
    };

    // unit packets leave the encoder untouched
    let encoder = if body.is_empty() {
        quote!(_encoder)
    } else {
        quote!(encoder)
    };
    Ok(quote! {
        impl crate::protocol::Encode for #ident {
            fn encode(&self, #encoder: &mut crate::protocol::Encoder) {
                #body
            }
        }
    })
}

pub fn derive_decode_on(input: &DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let body = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => {
                let literal = decode_named_fields(named)?;
                quote! { Ok(Self #literal) }
            }
            Fields::Unit => quote! { Ok(Self {}) },
            Fields::Unnamed(unnamed) => {
                return Err(syn::Error::new_spanned(
                    unnamed,
                    "packet structs use named fields",
                ))
            }
        },
        Data::Enum(data) => {
            let attrs = EnumAttrs::from_derive_input(input)?;
            decode_enum_body(data, &attrs.discriminant)?
        }
        Data::Union(data) => {
            return Err(syn::Error::new_spanned(
                data.union_token,
                "wire packets cannot be unions",
            ))
        }
    };

    let decoder = if matches!(&input.data, Data::Struct(data) if matches!(data.fields, Fields::Unit))
    {
        quote!(_decoder)
    } else {
        quote!(decoder)
    };
    Ok(quote! {
        impl crate::protocol::Decode for #ident {
            fn decode(
                #decoder: &mut crate::protocol::Decoder,
            ) -> ::std::result::Result<Self, crate::protocol::DecodeError> {
                #body
            }
        }
    })
}

fn encode_variant_arm(
    variant: &syn::Variant,
    discriminant: &Discriminant,
) -> syn::Result<TokenStream> {
    let name = &variant.ident;
    let id = VariantAttrs::from_variant(variant)?.id;
    let write_id = match discriminant {
        Discriminant::VarInt => quote! { encoder.write_var_int(#id); },
        Discriminant::Byte => {
            let id = u8::try_from(id)
                .map_err(|_| syn::Error::new_spanned(variant, "byte discriminant out of range"))?;
            quote! { encoder.write_u8(#id); }
        }
    };

    Ok(match &variant.fields {
        Fields::Unit => quote! {
            Self::#name => { #write_id }
        },
        Fields::Unnamed(unnamed) => {
            if unnamed.unnamed.len() != 1 {
                return Err(syn::Error::new_spanned(
                    unnamed,
                    "tuple variants hold exactly one payload",
                ));
            }
            let write = FieldCodec::resolve(&unnamed.unnamed[0])?.encode(&quote!(payload));
            quote! {
                Self::#name(payload) => { #write_id #write }
            }
        }
        Fields::Named(named) => {
            let bindings: Vec<_> = named
                .named
                .iter()
                .map(|field| field.ident.as_ref().unwrap())
                .collect();
            let writes = named
                .named
                .iter()
                .map(|field| {
                    let binding = field.ident.as_ref().unwrap();
                    Ok(FieldCodec::resolve(field)?.encode(&quote!(#binding)))
                })
                .collect::<syn::Result<Vec<_>>>()?;
            quote! {
                Self::#name { #(#bindings),* } => { #write_id #(#writes)* }
            }
        }
    })
}

/// Builds a `{ field: <decode expr>, .. }` literal. Struct expression
/// operands evaluate left to right, which preserves wire order.
fn decode_named_fields(named: &FieldsNamed) -> syn::Result<TokenStream> {
    let fields = named
        .named
        .iter()
        .map(|field| {
            let name = field.ident.as_ref().unwrap();
            let value = FieldCodec::resolve(field)?.decode();
            Ok(quote! { #name: #value })
        })
        .collect::<syn::Result<Vec<_>>>()?;
    Ok(quote! { { #(#fields,)* } })
}

fn decode_enum_body(data: &DataEnum, discriminant: &Discriminant) -> syn::Result<TokenStream> {
    let read_id = match discriminant {
        Discriminant::VarInt => quote! { decoder.read_var_int()? },
        Discriminant::Byte => quote! { i32::from(decoder.read_u8()?) },
    };

    let arms = data
        .variants
        .iter()
        .map(|variant| {
            let name = &variant.ident;
            let id = VariantAttrs::from_variant(variant)?.id;
            let construct = match &variant.fields {
                Fields::Unit => quote! { Ok(Self::#name) },
                Fields::Unnamed(unnamed) => {
                    if unnamed.unnamed.len() != 1 {
                        return Err(syn::Error::new_spanned(
                            unnamed,
                            "tuple variants hold exactly one payload",
                        ));
                    }
                    let value = FieldCodec::resolve(&unnamed.unnamed[0])?.decode();
                    quote! { Ok(Self::#name(#value)) }
                }
                Fields::Named(named) => {
                    let literal = decode_named_fields(named)?;
                    quote! { Ok(Self::#name #literal) }
                }
            };
            Ok(quote! { #id => #construct, })
        })
        .collect::<syn::Result<Vec<_>>>()?;

    Ok(quote! {
        match #read_id {
            #(#arms)*
            other => Err(crate::protocol::DecodeError::UnknownDiscriminant(i64::from(other))),
        }
    })
}
