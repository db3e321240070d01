use proc_macro::TokenStream;
use proc_macro_crate::{FoundCrate, crate_name};
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::punctuated::Punctuated;
use syn::token::Comma;
use syn::{Data, DeriveInput, Field, Fields, LitStr, parse_macro_input};

/// Generates a `<Model>Fields` accessor with one `FieldKey` per named field.
///
/// A key is the field's serde name: `#[serde(rename = "...")]` is honored, other serde
/// attributes are ignored.
#[proc_macro_derive(FormModel)]
pub fn derive_form_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "FormModel cannot be derived for generic types",
        ));
    }
    let named = named_fields(&input)?;

    let formtree = formtree_path();
    let model = &input.ident;
    let accessor = format_ident!("{model}Fields");

    let mut methods = Vec::with_capacity(named.len());
    let mut keys = Vec::with_capacity(named.len());
    for field in named {
        let Some(ident) = &field.ident else {
            continue;
        };
        let key = serde_key(field)?;
        methods.push(quote! {
            pub const fn #ident(&self) -> #formtree::form::FieldKey {
                #formtree::form::FieldKey::new(#key)
            }
        });
        keys.push(key);
    }

    Ok(quote! {
        #[derive(Clone, Copy, Debug, Default)]
        pub struct #accessor;

        impl #accessor {
            #(#methods)*
        }

        impl #formtree::form::FormModel for #model {
            type Fields = #accessor;

            fn fields() -> Self::Fields {
                #accessor
            }

            fn field_keys() -> &'static [#formtree::form::FieldKey] {
                const KEYS: &[#formtree::form::FieldKey] =
                    &[#(#formtree::form::FieldKey::new(#keys)),*];
                KEYS
            }
        }
    })
}

fn named_fields(input: &DeriveInput) -> syn::Result<&Punctuated<Field, Comma>> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => Ok(&fields.named),
            _ => Err(syn::Error::new_spanned(
                &input.ident,
                "FormModel needs a struct with named fields",
            )),
        },
        _ => Err(syn::Error::new_spanned(
            &input.ident,
            "FormModel can only be derived for structs",
        )),
    }
}

fn serde_key(field: &Field) -> syn::Result<String> {
    let mut key = None;
    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("serde")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") && meta.input.peek(syn::Token![=]) {
                let name: LitStr = meta.value()?.parse()?;
                key = Some(name.value());
            } else if meta.input.peek(syn::Token![=]) {
                meta.value()?.parse::<syn::Expr>()?;
            } else if meta.input.peek(syn::token::Paren) {
                let content;
                syn::parenthesized!(content in meta.input);
                content.parse::<TokenStream2>()?;
            }
            Ok(())
        })?;
    }
    Ok(key.unwrap_or_else(|| match &field.ident {
        Some(ident) => ident.to_string().trim_start_matches("r#").to_string(),
        None => String::new(),
    }))
}

fn formtree_path() -> TokenStream2 {
    match crate_name("formtree") {
        Ok(FoundCrate::Itself) => quote!(crate),
        Ok(FoundCrate::Name(name)) => {
            let ident = Ident::new(&name, Span::call_site());
            quote!(::#ident)
        }
        Err(_) => quote!(::formtree),
    }
}
