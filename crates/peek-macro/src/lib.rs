//! `po!`, `pv!` and `pe!`: record the call site and hand the values to `peek_core`.
//!
//! All three accept an optional trailing `end = <expr>` argument (anything `AsRef<str>`) that
//! replaces the default `"\n"` line terminator.

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::visit::{self, Visit};
use syn::{
    parse_macro_input, Arm, Block, Expr, ExprCall, ExprClosure, ExprForLoop, ExprIf, ExprIndex,
    ExprLet, ExprPath, ExprWhile, Ident, Item, Local, Pat, PatIdent, Token,
};

struct Invocation {
    values: Vec<Expr>,
    end: Option<Expr>,
}

impl Parse for Invocation {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut values = Vec::new();
        let mut end = None;
        while !input.is_empty() {
            if at_end_argument(input) {
                input.parse::<Ident>()?;
                input.parse::<Token![=]>()?;
                end = Some(input.parse()?);
                if !input.is_empty() {
                    input.parse::<Token![,]>()?;
                }
                if !input.is_empty() {
                    return Err(input.error("`end = ...` must be the last argument"));
                }
                break;
            }
            values.push(input.parse()?);
            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }
        Ok(Self { values, end })
    }
}

fn at_end_argument(input: ParseStream) -> bool {
    let fork = input.fork();
    match fork.parse::<Ident>() {
        Ok(ident) => ident == "end" && fork.peek(Token![=]) && !fork.peek(Token![==]),
        Err(_) => false,
    }
}

impl Invocation {
    fn single(self, name: &str) -> syn::Result<(Expr, Option<Expr>)> {
        let Invocation { mut values, end } = self;
        match values.len() {
            1 => Ok((values.remove(0), end)),
            _ => Err(syn::Error::new(
                Span::call_site(),
                format!("{}! expects exactly one expression", name),
            )),
        }
    }
}

/// Lowercase single-segment names read inside index sub-expressions, in order of appearance.
///
/// Names bound by patterns within the expression (match arms, `let`, `if let`, `for`) are not
/// in scope before the expression runs and are left out.
#[derive(Default)]
struct IndexLocals {
    names: Vec<Ident>,
    bound: Vec<Ident>,
    depth: usize,
}

impl IndexLocals {
    fn bind(&mut self, pat: &Pat) {
        let mut bindings = PatBindings::default();
        bindings.visit_pat(pat);
        self.bound.extend(bindings.names);
    }

    /// Visit `f` with the bindings it introduces dropped afterwards.
    fn scoped(&mut self, f: impl FnOnce(&mut Self)) {
        let mark = self.bound.len();
        f(self);
        self.bound.truncate(mark);
    }
}

impl<'ast> Visit<'ast> for IndexLocals {
    fn visit_expr_index(&mut self, node: &'ast ExprIndex) {
        self.visit_expr(&node.expr);
        self.depth += 1;
        self.visit_expr(&node.index);
        self.depth -= 1;
    }

    fn visit_expr_path(&mut self, node: &'ast ExprPath) {
        if self.depth == 0 || node.qself.is_some() {
            return;
        }
        if let Some(ident) = node.path.get_ident() {
            if is_local_name(ident) && !self.bound.contains(ident) && !self.names.contains(ident)
            {
                self.names.push(ident.clone());
            }
        }
    }

    fn visit_expr_call(&mut self, node: &'ast ExprCall) {
        // the callee is a function, not a binding
        for arg in &node.args {
            self.visit_expr(arg);
        }
    }

    fn visit_expr_closure(&mut self, _node: &'ast ExprClosure) {}

    fn visit_item(&mut self, _node: &'ast Item) {}

    fn visit_block(&mut self, node: &'ast Block) {
        self.scoped(|this| visit::visit_block(this, node));
    }

    fn visit_local(&mut self, node: &'ast Local) {
        if let Some(init) = &node.init {
            self.visit_expr(&init.expr);
            if let Some((_, diverge)) = &init.diverge {
                self.visit_expr(diverge);
            }
        }
        // visible to the rest of the enclosing block
        self.bind(&node.pat);
    }

    fn visit_arm(&mut self, node: &'ast Arm) {
        self.scoped(|this| {
            this.bind(&node.pat);
            if let Some((_, guard)) = &node.guard {
                this.visit_expr(guard);
            }
            this.visit_expr(&node.body);
        });
    }

    fn visit_expr_let(&mut self, node: &'ast ExprLet) {
        self.visit_expr(&node.expr);
        self.bind(&node.pat);
    }

    fn visit_expr_if(&mut self, node: &'ast ExprIf) {
        self.scoped(|this| {
            this.visit_expr(&node.cond);
            this.visit_block(&node.then_branch);
        });
        if let Some((_, else_branch)) = &node.else_branch {
            self.visit_expr(else_branch);
        }
    }

    fn visit_expr_while(&mut self, node: &'ast ExprWhile) {
        self.scoped(|this| {
            this.visit_expr(&node.cond);
            this.visit_block(&node.body);
        });
    }

    fn visit_expr_for_loop(&mut self, node: &'ast ExprForLoop) {
        self.visit_expr(&node.expr);
        self.scoped(|this| {
            this.bind(&node.pat);
            this.visit_block(&node.body);
        });
    }
}

/// Identifiers a pattern binds.
#[derive(Default)]
struct PatBindings {
    names: Vec<Ident>,
}

impl<'ast> Visit<'ast> for PatBindings {
    fn visit_pat_ident(&mut self, node: &'ast PatIdent) {
        self.names.push(node.ident.clone());
        visit::visit_pat_ident(self, node);
    }
}

fn is_local_name(ident: &Ident) -> bool {
    let name = ident.to_string();
    let first = name.trim_start_matches("r#").chars().next();
    name != "self" && matches!(first, Some(c) if c.is_lowercase() || c == '_')
}

fn index_locals(expr: &Expr) -> Vec<Ident> {
    let mut collector = IndexLocals::default();
    visit::visit_expr(&mut collector, expr);
    collector.names
}

fn terminator(end: Option<Expr>) -> TokenStream2 {
    let owner = Ident::new("__peek_end", Span::mixed_site());
    match end {
        Some(end) => quote! {
            let #owner = &(#end);
            let #owner: &str = ::core::convert::AsRef::<str>::as_ref(#owner);
        },
        None => quote! {
            let #owner: &str = "\n";
        },
    }
}

fn site(label: TokenStream2) -> TokenStream2 {
    quote! {
        ::peek_core::MacroSite::new(
            ::core::file!(),
            ::core::line!(),
            ::core::option_env!("CARGO_MANIFEST_DIR"),
            ::core::stringify!(#label),
        )
    }
}

fn expand_po(input: Invocation) -> TokenStream2 {
    let values = &input.values;
    let site = site(quote! { #(#values),* });
    let end = terminator(input.end);
    let end_ident = Ident::new("__peek_end", Span::mixed_site());
    let values_ident = Ident::new("__peek_values", Span::mixed_site());
    quote! {
        {
            #[allow(unused_imports)]
            use ::peek_core::__private::{DebugProbe as _, InspectProbe as _};
            let #values_ident: &[::peek_core::Inspected] = &[
                #((&::peek_core::__private::Probe(&(#values))).peek_value()),*
            ];
            #end
            ::peek_core::inspector().po(&#site, #values_ident, #end_ident);
        }
    }
}

fn expand_pv(expr: Expr, end: Option<Expr>) -> TokenStream2 {
    let names = index_locals(&expr);
    let keys = names.iter().map(|name| name.to_string());
    let site = site(quote! { #expr });
    let end = terminator(end);
    let end_ident = Ident::new("__peek_end", Span::mixed_site());
    let value = Ident::new("__peek_value", Span::mixed_site());
    let locals = Ident::new("__peek_locals", Span::mixed_site());
    let local = Ident::new("__peek_local", Span::mixed_site());
    quote! {
        {
            #[allow(unused_imports)]
            use ::peek_core::__private::{DebugProbe as _, InspectProbe as _, OpaqueProbe as _};
            #[allow(unused_mut)]
            let mut #locals = ::peek_core::Locals::new();
            #(
                if let ::core::option::Option::Some(#local) =
                    (&::peek_core::__private::Probe(&#names)).peek_local()
                {
                    #locals.insert(#keys, #local);
                }
            )*
            // snapshot first: evaluating the expression may move an index binding
            let #value = &(#expr);
            #end
            ::peek_core::inspector().pv(
                &#site.with_locals(#locals),
                &(&::peek_core::__private::Probe(#value)).peek_value(),
                #end_ident,
            );
        }
    }
}

fn expand_pe(expr: Expr, end: Option<Expr>) -> TokenStream2 {
    let site = site(quote! { #expr });
    let end = terminator(end);
    let end_ident = Ident::new("__peek_end", Span::mixed_site());
    let value = Ident::new("__peek_value", Span::mixed_site());
    quote! {
        {
            #[allow(unused_imports)]
            use ::peek_core::__private::{DebugProbe as _, InspectProbe as _};
            let #value = &(#expr);
            #end
            ::peek_core::inspector().pe(
                &#site,
                &(&::peek_core::__private::Probe(#value)).peek_value(),
                #end_ident,
            );
        }
    }
}

/// Print the values, comma separated: `po!(1, "a")` prints `12@main.rs 1, a`.
#[proc_macro]
pub fn po(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as Invocation);
    expand_po(input).into()
}

/// Print an expression with its index sub-expressions resolved: `pv!(lst[i])` prints
/// `12@main.rs lst[1] = 20`.
#[proc_macro]
pub fn pv(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as Invocation);
    match input.single("pv") {
        Ok((expr, end)) => expand_pv(expr, end).into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Print an expression verbatim with its value: `pe!(1 + 2 * 3)` prints `12@main.rs 1 + 2 * 3 = 7`.
#[proc_macro]
pub fn pe(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as Invocation);
    match input.single("pe") {
        Ok((expr, end)) => expand_pe(expr, end).into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn names(expr: Expr) -> Vec<String> {
        index_locals(&expr).iter().map(ToString::to_string).collect()
    }

    #[test]
    fn index_names_are_collected_once() {
        assert_eq!(names(parse_quote!(m[i][i + j])), vec!["i", "j"]);
        assert_eq!(names(parse_quote!(lst[len(v)])), vec!["v"]);
        assert!(names(parse_quote!(total)).is_empty());
    }

    #[test]
    fn names_bound_inside_the_index_are_skipped() {
        assert_eq!(
            names(parse_quote!(lst[match o { Some(n) => n + k, None => 0 }])),
            vec!["o", "k"]
        );
        assert_eq!(names(parse_quote!(lst[{ let k = i; k }])), vec!["i"]);
        assert_eq!(
            names(parse_quote!(lst[if let Some(n) = o { n } else { n }])),
            vec!["o", "n"]
        );
        assert_eq!(
            names(parse_quote!(lst[{ let mut s = 0; for x in xs { s += x; } s }])),
            vec!["xs"]
        );
    }
}
