//! `#[transactional]` attribute macro.
//!
//! Rewrites
//!
//! ```ignore
//! #[transactional(error_policy = "status", nested)]
//! fn create_user(repo: &Repo, email: String) -> Result<User, DataError> {
//!     repo.insert(email)
//! }
//! ```
//!
//! into a function returning `Outcome<User, DataError>` whose body runs
//! inside `Transactional::new().error_policy(..).nested(true).run(..)`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Expr, ExprLit, GenericArgument, ItemFn, Lit, Meta, PathArguments,
    ReturnType, Type,
};

use crate::crate_path::txscope_core_path;

// ── Argument parsing ─────────────────────────────────────────────────────

#[derive(Default)]
struct TransactionalArgs {
    error_policy: Option<syn::LitStr>,
    existing_txn_policy: Option<syn::LitStr>,
    nested: bool,
    /// Expression yielding `&Arc<TxManager>`; the global manager otherwise.
    manager: Option<Expr>,
}

const ERROR_POLICIES: &[(&str, &str)] = &[("raise", "Raise"), ("status", "Status")];

const EXISTING_TXN_POLICIES: &[(&str, &str)] = &[
    ("error", "Error"),
    ("join", "Join"),
    ("savepoint", "Savepoint"),
    ("adopt_autobegin", "AdoptAutobegin"),
    ("reset", "Reset"),
];

fn str_lit(value: &Expr, key: &str) -> syn::Result<syn::LitStr> {
    if let Expr::Lit(ExprLit {
        lit: Lit::Str(s), ..
    }) = value
    {
        Ok(s.clone())
    } else {
        Err(syn::Error::new_spanned(
            value,
            format!("expected a string literal for `{key}`"),
        ))
    }
}

impl TransactionalArgs {
    fn parse(args: TokenStream) -> syn::Result<Self> {
        let mut this = Self::default();

        if args.is_empty() {
            return Ok(this);
        }

        let meta_list: syn::punctuated::Punctuated<Meta, syn::Token![,]> =
            syn::parse::Parser::parse(syn::punctuated::Punctuated::parse_terminated, args)?;

        for meta in meta_list {
            match &meta {
                Meta::NameValue(nv) => {
                    let key = nv
                        .path
                        .get_ident()
                        .map(|i| i.to_string())
                        .unwrap_or_default();

                    match key.as_str() {
                        "error_policy" => this.error_policy = Some(str_lit(&nv.value, &key)?),
                        "existing_txn_policy" => {
                            this.existing_txn_policy = Some(str_lit(&nv.value, &key)?)
                        }
                        "nested" => {
                            if let Expr::Lit(ExprLit {
                                lit: Lit::Bool(b), ..
                            }) = &nv.value
                            {
                                this.nested = b.value;
                            } else {
                                return Err(syn::Error::new_spanned(
                                    &nv.value,
                                    "expected a boolean literal for `nested`",
                                ));
                            }
                        }
                        "manager" => this.manager = Some(nv.value.clone()),
                        _ => {
                            return Err(syn::Error::new_spanned(
                                &nv.path,
                                format!("unknown argument `{key}`"),
                            ));
                        }
                    }
                }
                Meta::Path(path) if path.is_ident("nested") => this.nested = true,
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "expected `nested` or `key = value` arguments",
                    ));
                }
            }
        }

        Ok(this)
    }
}

fn policy_variant(
    lit: &syn::LitStr,
    table: &[(&str, &str)],
    what: &str,
) -> syn::Result<syn::Ident> {
    let value = lit.value().to_ascii_lowercase().replace('-', "_");
    table
        .iter()
        .find(|(name, _)| *name == value)
        .map(|(_, variant)| syn::Ident::new(variant, lit.span()))
        .ok_or_else(|| {
            let expected: Vec<_> = table.iter().map(|(name, _)| *name).collect();
            syn::Error::new_spanned(
                lit,
                format!(
                    "unknown {what} \"{}\", expected one of: {}",
                    lit.value(),
                    expected.join(", ")
                ),
            )
        })
}

/// Split `Result<T, E>` into `(Result<T, E>, T, E)`.
fn result_parts(output: &ReturnType) -> syn::Result<(Type, Type, Type)> {
    let ty = match output {
        ReturnType::Type(_, ty) => ty,
        ReturnType::Default => {
            return Err(syn::Error::new_spanned(
                output,
                "#[transactional] functions must return `Result<T, E>`",
            ))
        }
    };

    if let Type::Path(path) = ty.as_ref() {
        if let Some(last) = path.path.segments.last() {
            if last.ident == "Result" {
                if let PathArguments::AngleBracketed(args) = &last.arguments {
                    let types: Vec<&Type> = args
                        .args
                        .iter()
                        .filter_map(|arg| match arg {
                            GenericArgument::Type(t) => Some(t),
                            _ => None,
                        })
                        .collect();
                    if let [ok, err] = types.as_slice() {
                        return Ok((ty.as_ref().clone(), (*ok).clone(), (*err).clone()));
                    }
                }
            }
        }
    }

    Err(syn::Error::new_spanned(
        ty,
        "#[transactional] functions must return `Result<T, E>` with both type arguments spelled out",
    ))
}

// ── Codegen ──────────────────────────────────────────────────────────────

fn expand_inner(args: TransactionalArgs, func: ItemFn) -> syn::Result<TokenStream2> {
    let krate = txscope_core_path();
    let sig = &func.sig;

    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "#[transactional] does not support async functions",
        ));
    }

    let (result_ty, ok_ty, err_ty) = result_parts(&sig.output)?;

    let mut builder = quote! { #krate::Transactional::new() };
    if let Some(manager) = &args.manager {
        builder = quote! { #builder.manager(#manager) };
    }
    if let Some(lit) = &args.error_policy {
        let variant = policy_variant(lit, ERROR_POLICIES, "error policy")?;
        builder = quote! { #builder.error_policy(#krate::ErrorPolicy::#variant) };
    }
    if let Some(lit) = &args.existing_txn_policy {
        let variant = policy_variant(lit, EXISTING_TXN_POLICIES, "existing transaction policy")?;
        builder = quote! { #builder.existing_txn_policy(#krate::ExistingTxnPolicy::#variant) };
    }
    if args.nested {
        builder = quote! { #builder.nested(true) };
    }

    let mut new_sig = sig.clone();
    new_sig.output = syn::parse_quote! { -> #krate::Outcome<#ok_ty, #err_ty> };

    let vis = &func.vis;
    let attrs = &func.attrs;
    let body = &func.block;

    Ok(quote! {
        #(#attrs)*
        #vis #new_sig {
            #builder.run(move || -> #result_ty #body)
        }
    })
}

pub fn expand(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = match TransactionalArgs::parse(args) {
        Ok(args) => args,
        Err(err) => return err.to_compile_error().into(),
    };
    let func = parse_macro_input!(input as ItemFn);
    match expand_inner(args, func) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
