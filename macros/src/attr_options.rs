use proc_macro::TokenStream;
use quote::quote;
use syn::parse::Parser;

/// Values from parsed `#[stint::lines]` options.
pub(crate) struct AttrOptions {
    /// `stint::__private`.
    ///
    /// Generated markers reach libstd through `stint::__private::std` because
    /// it's possible (although unlikely) to do `extern crate x as std`, which
    /// would cause `::std` to reference crate `x` instead.
    pub private_mod: proc_macro2::TokenStream,
}

impl AttrOptions {
    pub fn parse(tokens: TokenStream, macro_name: &str) -> Result<Self, TokenStream> {
        let mut stint_crate = None::<syn::Path>;

        let attr_parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("crate") {
                if stint_crate.is_none() {
                    stint_crate = Some(meta.value()?.parse()?);
                    Ok(())
                } else {
                    Err(meta.error(format_args!("repeated '{macro_name}' option")))
                }
            } else {
                Err(meta.error(format_args!("unsupported '{macro_name}' option")))
            }
        });

        match attr_parser.parse(tokens) {
            Ok(()) => {}
            Err(error) => return Err(error.into_compile_error().into()),
        }

        Ok(Self::with_crate(stint_crate))
    }

    pub fn with_crate(stint_crate: Option<syn::Path>) -> Self {
        let stint_crate = stint_crate.unwrap_or_else(|| syn::parse_quote!(::stint));
        Self { private_mod: quote! { #stint_crate::__private } }
    }
}
