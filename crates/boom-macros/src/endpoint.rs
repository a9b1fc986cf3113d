use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{
    FnArg, GenericArgument, Ident, ItemFn, LitStr, Pat, PathArguments, ReturnType, Type,
    meta::ParseNestedMeta, parse::Result,
};

// ─── Attribute arguments ─────────────────────────────────────────────────────

/// Options of `#[endpoint(name = "...", view)]`.
#[derive(Default)]
pub struct EndpointArgs {
    name: Option<LitStr>,
    view: bool,
}

impl EndpointArgs {
    pub fn parse(&mut self, meta: ParseNestedMeta) -> Result<()> {
        if meta.path.is_ident("name") {
            self.name = Some(meta.value()?.parse()?);
            Ok(())
        } else if meta.path.is_ident("view") {
            self.view = true;
            Ok(())
        } else {
            Err(meta.error("unknown endpoint option; expected `name = \"...\"` or `view`"))
        }
    }
}

// ─── Parameter classification ────────────────────────────────────────────────

/// How a declared Rust type maps to an annotation and an extraction.
enum Kind {
    /// `i64`
    Int,
    /// `i32`, `u64`, `u32`, `usize`: parsed as `i64`, then narrowed.
    NarrowInt,
    /// `f64`
    Float,
    /// `f32`
    NarrowFloat,
    Bool,
    Str,
    /// `Arc<Request>`
    Request,
    /// `Parameter`
    Parameter,
    /// `Option<String>`: unannotated, absent when unbound.
    OptionalStr,
    /// `Arc<T>`: type tag `T`, shared.
    Shared(Type),
    /// Any other `T`: type tag `T`, cloned.
    Owned,
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last(),
        _ => None,
    }
}

fn single_type_arg(segment: &syn::PathSegment) -> Option<&Type> {
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first() {
        Some(GenericArgument::Type(ty)) if args.args.len() == 1 => Some(ty),
        _ => None,
    }
}

fn is_named(ty: &Type, name: &str) -> bool {
    last_segment(ty).is_some_and(|s| s.ident == name && s.arguments.is_none())
}

fn classify(ty: &Type) -> Kind {
    let Some(segment) = last_segment(ty) else {
        return Kind::Owned;
    };

    match segment.ident.to_string().as_str() {
        "i64" => Kind::Int,
        "i32" | "u64" | "u32" | "usize" => Kind::NarrowInt,
        "f64" => Kind::Float,
        "f32" => Kind::NarrowFloat,
        "bool" => Kind::Bool,
        "String" => Kind::Str,
        "Parameter" => Kind::Parameter,
        "Option" => match single_type_arg(segment) {
            Some(inner) if is_named(inner, "String") => Kind::OptionalStr,
            _ => Kind::Owned,
        },
        "Arc" => match single_type_arg(segment) {
            Some(inner) if is_named(inner, "Request") => Kind::Request,
            Some(inner) => Kind::Shared(inner.clone()),
            None => Kind::Owned,
        },
        _ => Kind::Owned,
    }
}

// ─── Expansion ───────────────────────────────────────────────────────────────

struct Param {
    ident: Ident,
    name: LitStr,
    ty: Type,
    kind: Kind,
}

impl Param {
    fn declaration(&self) -> TokenStream {
        let name = &self.name;
        match &self.kind {
            Kind::Int | Kind::NarrowInt => quote!(.int(#name)),
            Kind::Float | Kind::NarrowFloat => quote!(.float(#name)),
            Kind::Bool => quote!(.bool(#name)),
            Kind::Str => quote!(.string(#name)),
            Kind::Request => quote!(.request(#name)),
            Kind::Parameter => quote!(.parameter(#name)),
            Kind::OptionalStr => quote!(.untyped(#name)),
            Kind::Shared(inner) => quote!(.param::<#inner>(#name)),
            Kind::Owned => {
                let ty = &self.ty;
                quote!(.param::<#ty>(#name))
            }
        }
    }

    fn extraction(&self) -> TokenStream {
        let Self { ident, name, ty, .. } = self;
        let value = match &self.kind {
            Kind::Int => quote!(*__args.get::<i64>(#name)?),
            Kind::NarrowInt => quote! {
                <#ty as ::core::convert::TryFrom<i64>>::try_from(*__args.get::<i64>(#name)?)
                    .map_err(|e| ::boom_core::BoomError::argument(#name, e.to_string()))?
            },
            Kind::Float => quote!(*__args.get::<f64>(#name)?),
            Kind::NarrowFloat => quote!(*__args.get::<f64>(#name)? as f32),
            Kind::Bool => quote!(*__args.get::<bool>(#name)?),
            Kind::Str => quote!(__args.cloned::<::std::string::String>(#name)?),
            Kind::Request => quote!(__args.get::<::boom_core::Request>(#name)?),
            Kind::Parameter => quote!(__args.cloned::<::boom_core::Parameter>(#name)?),
            Kind::OptionalStr => quote! {
                __args
                    .opt::<::std::string::String>(#name)
                    .map(|v| ::std::string::String::clone(&v))
            },
            Kind::Shared(inner) => quote!(__args.get::<#inner>(#name)?),
            Kind::Owned => quote!(__args.cloned::<#ty>(#name)?),
        };
        quote!(let #ident: #ty = #value;)
    }
}

fn collect_params(func: &ItemFn) -> Result<Vec<Param>> {
    func.sig
        .inputs
        .iter()
        .map(|input| {
            let FnArg::Typed(typed) = input else {
                return Err(syn::Error::new_spanned(
                    input,
                    "#[endpoint] functions cannot take `self`",
                ));
            };
            let Pat::Ident(pat) = typed.pat.as_ref() else {
                return Err(syn::Error::new_spanned(
                    &typed.pat,
                    "#[endpoint] parameters must be plain identifiers",
                ));
            };
            let ident = pat.ident.clone();
            let raw = ident.to_string();
            let name = LitStr::new(raw.trim_start_matches("r#"), ident.span());
            Ok(Param {
                ident,
                name,
                ty: (*typed.ty).clone(),
                kind: classify(&typed.ty),
            })
        })
        .collect()
}

/// Expands `#[endpoint]` on an `async fn` into a constructor of the same
/// name returning a `BoxedCallable`.
pub fn expand(args: EndpointArgs, func: ItemFn) -> Result<TokenStream> {
    if func.sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(
            func.sig.fn_token,
            "#[endpoint] requires an `async fn`",
        ));
    }
    if !func.sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &func.sig.generics,
            "#[endpoint] functions cannot be generic",
        ));
    }

    let params = collect_params(&func)?;
    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = func;

    let fn_name = &sig.ident;
    let callable_name = args
        .name
        .unwrap_or_else(|| LitStr::new(&fn_name.to_string(), fn_name.span()));
    let view = args.view.then(|| quote!(.view_method()));

    let inputs = &sig.inputs;
    let output = match &sig.output {
        ReturnType::Default => quote!(),
        ReturnType::Type(arrow, ty) => quote!(#arrow #ty),
    };

    let inner = format_ident!("__boom_endpoint");
    let declarations = params.iter().map(Param::declaration);
    let extractions = params.iter().map(Param::extraction);
    let idents = params.iter().map(|p| &p.ident);

    Ok(quote! {
        #(#attrs)*
        #vis fn #fn_name() -> ::boom_core::BoxedCallable {
            async fn #inner(#inputs) #output #block

            async fn __boom_invoke(
                __args: ::boom_core::Arguments,
            ) -> ::core::result::Result<::boom_core::Reply, ::boom_core::BoxError> {
                #(#extractions)*
                ::boom_core::IntoOutcome::into_outcome(#inner(#(#idents),*).await)
            }

            let signature = ::boom_core::Signature::builder(#callable_name)
                #(#declarations)*
                #view
                .build();
            ::boom_core::from_fn(signature, __boom_invoke)
        }
    })
}
