//! Line instrumentation macros for [stint](https://docs.rs/stint).
//!
//! See [`stint`](https://docs.rs/stint) crate for documentation.

use proc_macro::TokenStream;
use quote::ToTokens;
use syn::parse::Parser;

mod attr_options;
mod instrument;

use attr_options::AttrOptions;
use instrument::Instrumenter;

/// Raises a line event before every statement of the function body.
///
/// Events reach the line tracer attached to the current thread, if any, so an
/// instrumented function called from a traced block reports its own lines.
///
/// # Options
///
/// - `crate = path`: where `stint` can be found, if it was renamed.
#[proc_macro_attribute]
pub fn lines(attr: TokenStream, item: TokenStream) -> TokenStream {
    let options = match AttrOptions::parse(attr, "lines") {
        Ok(options) => options,
        Err(error) => return error,
    };

    let mut fn_item = syn::parse_macro_input!(item as syn::ItemFn);

    Instrumenter { private_mod: &options.private_mod }.block(&mut fn_item.block);

    fn_item.into_token_stream().into()
}

/// Evaluates a block of statements, raising a line event before each one.
///
/// The macro evaluates to the value of the block's trailing expression.
///
/// ```ignore
/// let total = stint::traced! {
///     let mut x = 0;
///     for i in 0..3 {
///         x += i;
///     }
///     x
/// };
/// ```
#[proc_macro]
pub fn traced(input: TokenStream) -> TokenStream {
    let span = proc_macro2::Span::call_site();

    let stmts = match syn::Block::parse_within.parse(input) {
        Ok(stmts) => stmts,
        Err(error) => return error.into_compile_error().into(),
    };

    let options = AttrOptions::with_crate(None);
    let stmts = Instrumenter { private_mod: &options.private_mod }.stmts(stmts);

    instrument::block_expr(&stmts, span).into()
}
