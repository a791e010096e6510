//! Statement rewriting.
//!
//! Every statement of an instrumented block is preceded by a marker that
//! raises a line event for the statement's first line. Loops get no marker of
//! their own so that a loop body line executed `K` times is counted `K` times;
//! their setup and per-iteration overhead fold into whichever line is pending.

use proc_macro2::{Group, Span, TokenStream, TokenTree};
use quote::quote_spanned;
use syn::{spanned::Spanned, Block, Expr, Stmt};

pub(crate) struct Instrumenter<'a> {
    /// `stint::__private`.
    pub private_mod: &'a TokenStream,
}

impl Instrumenter<'_> {
    pub fn block(&self, block: &mut Block) {
        let stmts = std::mem::take(&mut block.stmts);
        block.stmts = self.stmts(stmts);
    }

    pub fn stmts(&self, stmts: Vec<Stmt>) -> Vec<Stmt> {
        let mut result = Vec::with_capacity(stmts.len() * 2);

        for mut stmt in stmts {
            let needs_marker = match &mut stmt {
                // Nested items are instrumented only through their own
                // `#[stint::lines]` attribute.
                Stmt::Item(_) => false,

                Stmt::Local(local) => {
                    if let Some(init) = &mut local.init {
                        self.expr(&mut init.expr);
                    }
                    true
                }

                Stmt::Expr(expr, _) => {
                    self.expr(expr);
                    !is_loop(expr)
                }

                Stmt::Macro(_) => true,
            };

            if needs_marker {
                result.push(self.marker(stmt.span()));
            }
            result.push(stmt);
        }

        result
    }

    /// Instruments blocks nested directly in control flow.
    fn expr(&self, expr: &mut Expr) {
        match expr {
            Expr::If(expr) => {
                self.block(&mut expr.then_branch);
                if let Some((_, else_branch)) = &mut expr.else_branch {
                    self.expr(else_branch);
                }
            }
            Expr::ForLoop(expr) => self.block(&mut expr.body),
            Expr::While(expr) => self.block(&mut expr.body),
            Expr::Loop(expr) => self.block(&mut expr.body),
            Expr::Block(expr) => self.block(&mut expr.block),
            Expr::Unsafe(expr) => self.block(&mut expr.block),
            Expr::Match(expr) => {
                for arm in &mut expr.arms {
                    self.expr(&mut arm.body);
                }
            }
            _ => {}
        }
    }

    /// Creates a marker statement located at `span`.
    ///
    /// `line!()` resolves to the line of its invocation, so every token of the
    /// invocation path must carry the statement's span.
    fn marker(&self, span: Span) -> Stmt {
        let private_mod = respan(self.private_mod.clone(), span);

        syn::parse_quote_spanned! {span=>
            #private_mod::line_event(
                #private_mod::std::file!(),
                #private_mod::std::line!(),
                #private_mod::std::env!("CARGO_MANIFEST_DIR"),
            );
        }
    }
}

fn is_loop(expr: &Expr) -> bool {
    matches!(expr, Expr::ForLoop(_) | Expr::While(_) | Expr::Loop(_))
}

fn respan(tokens: TokenStream, span: Span) -> TokenStream {
    tokens
        .into_iter()
        .map(|mut token| {
            match &mut token {
                TokenTree::Group(group) => {
                    let mut new_group = Group::new(group.delimiter(), respan(group.stream(), span));
                    new_group.set_span(span);
                    *group = new_group;
                }
                other => other.set_span(span),
            }
            token
        })
        .collect()
}

/// Wraps instrumented statements in a block expression.
pub(crate) fn block_expr(stmts: &[Stmt], span: Span) -> TokenStream {
    quote_spanned! {span=>
        {
            #(#stmts)*
        }
    }
}
