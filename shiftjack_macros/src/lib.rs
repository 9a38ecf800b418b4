use proc_macro::TokenStream as TokenStream1;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{parse_macro_input, Ident, ImplItemFn, LitStr};

/// This macro is added before a method of `Simulator` in its impl block.
/// The method first checks that the round is exactly in the phase named in the
/// attribute.
///
/// For example, `#[allowed_phase(DealerTurn)]` makes a method return
/// `SimulationError::WrongPhase` unless the current phase is
/// `RoundPhase::DealerTurn`. The method must return `Result<_, SimulationError>`.
#[proc_macro_attribute]
pub fn allowed_phase(attr: TokenStream1, item: TokenStream1) -> TokenStream1 {
    let phase = parse_macro_input!(attr as Ident);
    let mut ast = parse_macro_input!(item as ImplItemFn);
    let method = LitStr::new(&ast.sig.ident.to_string(), ast.sig.ident.span());

    let guard = phase_guard(&phase, &method);
    let early_return: syn::Stmt = syn::parse_quote!(#guard);
    ast.block.stmts.insert(0, early_return);
    ast.into_token_stream().into()
}

fn phase_guard(phase: &Ident, method: &LitStr) -> TokenStream2 {
    quote! {
        if self.phase != RoundPhase::#phase {
            return Err(SimulationError::WrongPhase {
                method: #method,
                expected: RoundPhase::#phase,
                actual: self.phase,
            });
        }
    }
}
