//! Crate path resolution for generated code.
//!
//! Detects whether the user depends on `txscope` (facade) or `txscope-core`
//! directly, and returns the appropriate path prefix for generated code.

use proc_macro2::TokenStream;
use proc_macro_crate::{crate_name, FoundCrate};
use quote::quote;

fn found_path(found: FoundCrate) -> TokenStream {
    match found {
        FoundCrate::Itself => quote!(crate),
        FoundCrate::Name(name) => {
            let ident = syn::Ident::new(&name, proc_macro2::Span::call_site());
            quote!(::#ident)
        }
    }
}

/// Returns the token stream for accessing `txscope_core` types.
///
/// If the user depends on `txscope`, returns `::txscope`.
/// Otherwise returns `::txscope_core`.
pub fn txscope_core_path() -> TokenStream {
    if let Ok(found) = crate_name("txscope") {
        found_path(found)
    } else if let Ok(found) = crate_name("txscope-core") {
        found_path(found)
    } else {
        // Fallback - assume txscope_core is available (for error messages)
        quote!(::txscope_core)
    }
}
