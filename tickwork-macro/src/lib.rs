use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Expr, ExprLit, FnArg, ItemFn, Lit, Meta, MetaNameValue, Token};

/// Turn an async function into a recurring background task definition.
///
/// The function keeps its name and signature. Next to it the macro generates
/// `<name>_task()`, which builds a `BackgroundTask` ready to hand to
/// `BackgroundScheduler::register_background_task`.
///
/// # Example
///
/// ```rust,ignore
/// use tickwork::{background_task, CancellationToken, TaskError};
///
/// #[background_task(interval = "30s", run_immediately = true)]
/// async fn purge_sessions(_scope: (), token: CancellationToken) -> Result<(), TaskError> {
///     if token.is_cancelled() {
///         return Err(TaskError::Canceled);
///     }
///     Ok(())
/// }
///
/// // scheduler.register_background_task(purge_sessions_task()?)?;
/// ```
///
/// # Parameters
///
/// - `interval`: shorthand string (`"250ms"`, `"5s"`) or integer milliseconds. Required.
/// - `run_immediately`: also run once as soon as the host starts. Defaults to `false`.
/// - `name`: task name. Defaults to the function name.
#[proc_macro_attribute]
pub fn background_task(args: TokenStream, input: TokenStream) -> TokenStream {
    let attr_args = syn::parse_macro_input!(args with Punctuated::<Meta, Token![,]>::parse_terminated);
    let input_fn = syn::parse_macro_input!(input as ItemFn);

    match expand(&attr_args, &input_fn) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

struct TaskArgs {
    name: String,
    interval: String,
    run_immediately: bool,
}

fn expand(
    attr_args: &Punctuated<Meta, Token![,]>,
    input_fn: &ItemFn,
) -> syn::Result<proc_macro2::TokenStream> {
    let sig = &input_fn.sig;
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(
            sig.fn_token.span(),
            "background_task can only be applied to async functions",
        ));
    }
    if sig.inputs.len() != 2 {
        return Err(syn::Error::new(
            sig.inputs.span(),
            "background_task functions take (scope, CancellationToken)",
        ));
    }

    let scope_ty = match sig.inputs.first() {
        Some(FnArg::Typed(pat)) => &pat.ty,
        _ => {
            return Err(syn::Error::new(sig.inputs.span(), "background_task cannot be a method"));
        }
    };

    let fn_name = &sig.ident;
    let fn_vis = &input_fn.vis;
    let args = parse_task_args(attr_args, &fn_name.to_string())?;
    let TaskArgs {
        name,
        interval,
        run_immediately,
    } = args;

    let task_fn_name = format_ident!("{}_task", fn_name);
    let doc = format!("Background task definition for [`{fn_name}`].");

    Ok(quote! {
        #input_fn

        #[doc = #doc]
        #fn_vis fn #task_fn_name() -> ::core::result::Result<
            ::tickwork::tickwork_runtime::BackgroundTask<#scope_ty>,
            ::tickwork::tickwork_runtime::ConfigError,
        > {
            ::tickwork::tickwork_runtime::BackgroundTask::builder(#name)
                .interval_str(#interval)
                .run_immediately(#run_immediately)
                .callback(#fn_name)
                .build()
        }
    })
}

fn parse_task_args(
    attr_args: &Punctuated<Meta, Token![,]>,
    default_name: &str,
) -> syn::Result<TaskArgs> {
    let mut name = None;
    let mut interval = None;
    let mut run_immediately = false;

    for arg in attr_args {
        let Meta::NameValue(MetaNameValue { path, value, .. }) = arg else {
            return Err(syn::Error::new(arg.span(), "expected `key = value`"));
        };
        let key = path.get_ident().map(|i| i.to_string()).unwrap_or_default();

        match key.as_str() {
            "interval" => {
                interval = Some(match value {
                    Expr::Lit(ExprLit { lit: Lit::Int(i), .. }) => i.base10_digits().to_string(),
                    Expr::Lit(ExprLit { lit: Lit::Str(s), .. }) => s.value(),
                    _ => return Err(syn::Error::new(value.span(), "interval must be int or string")),
                });
            }
            "run_immediately" => {
                run_immediately = match value {
                    Expr::Lit(ExprLit { lit: Lit::Bool(b), .. }) => b.value,
                    _ => return Err(syn::Error::new(value.span(), "run_immediately must be a bool")),
                };
            }
            "name" => {
                name = Some(match value {
                    Expr::Lit(ExprLit { lit: Lit::Str(s), .. }) if !s.value().trim().is_empty() => s.value(),
                    _ => return Err(syn::Error::new(value.span(), "name must be a non-empty string")),
                });
            }
            other => {
                return Err(syn::Error::new(
                    path.span(),
                    format!("unknown background_task argument `{other}`"),
                ));
            }
        }
    }

    let interval = interval.ok_or_else(|| {
        syn::Error::new(
            proc_macro2::Span::call_site(),
            "background_task requires `interval` (e.g. interval = \"5s\")",
        )
    })?;

    Ok(TaskArgs {
        name: name.unwrap_or_else(|| default_name.to_string()),
        interval,
        run_immediately,
    })
}
