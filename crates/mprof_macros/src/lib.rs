//! `#[profiled]` attribute
//!
//! Applied to an inherent `impl` block, the attribute moves every method body
//! into a hidden `__mprof_<name>` function and puts a forwarding wrapper with
//! the original signature in its place. The wrapper hands the call to the
//! type's `MethodTable`, which times it only while an interceptor is active.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{ToTokens, format_ident, quote};
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::{
    Attribute, Error, FnArg, GenericParam, ImplItem, ImplItemFn, ItemImpl, LitStr, Path,
    ReturnType, Type, Visibility, parse_macro_input, parse_quote,
};

struct Options {
    krate: Path,
    name: Option<String>,
    extend: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            krate: parse_quote!(::method_profiler),
            name: None,
            extend: false,
        }
    }
}

impl Options {
    fn parse(&mut self, meta: &ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("crate") {
            let lit: LitStr = meta.value()?.parse()?;
            self.krate = lit.parse()?;
            Ok(())
        } else if meta.path.is_ident("name") {
            let lit: LitStr = meta.value()?.parse()?;
            self.name = Some(lit.value());
            Ok(())
        } else if meta.path.is_ident("extend") {
            self.extend = true;
            Ok(())
        } else {
            Err(meta.error("unsupported profiled option, expected `crate`, `name` or `extend`"))
        }
    }
}

/// Wrap every method of an inherent `impl` block with profiling hooks.
///
/// ```rust,ignore
/// use method_profiler::profiled;
///
/// struct Cache;
///
/// #[profiled]
/// impl Cache {
///     pub fn open() -> Self { Cache }
///     pub fn get(&self, key: &str) -> Option<&str> { self.lookup(key) }
///     fn lookup(&self, _key: &str) -> Option<&str> { None }
///
///     #[profiled(skip)]
///     pub async fn refresh(&self) {}
/// }
/// ```
///
/// Options: `crate = "path"` points the generated code at a re-export of the
/// runtime, `name = "Label"` overrides the owner name used in reports.
///
/// A type has one primary `#[profiled]` block, which defines its method
/// table. Further blocks of the same type use `#[profiled(extend)]`; their
/// methods are timed and reported under the same owner but are not listed in
/// `MethodTable::methods`.
///
/// ```rust,ignore
/// #[profiled]
/// impl Cache {
///     pub fn get(&self, key: &str) -> Option<&str> { None }
/// }
///
/// #[profiled(extend)]
/// impl Cache {
///     pub fn open() -> Self { Cache }
/// }
/// ```
#[proc_macro_attribute]
pub fn profiled(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut options = Options::default();
    let parser = syn::meta::parser(|meta| options.parse(&meta));
    parse_macro_input!(attr with parser);

    let item = parse_macro_input!(item as ItemImpl);
    expand(item, &options)
        .unwrap_or_else(Error::into_compile_error)
        .into()
}

fn expand(mut item: ItemImpl, options: &Options) -> syn::Result<TokenStream2> {
    if let Some((_, path, _)) = &item.trait_ {
        return Err(Error::new_spanned(
            path,
            "#[profiled] only supports inherent impl blocks",
        ));
    }

    if options.extend && options.name.is_some() {
        return Err(Error::new_spanned(
            &item.self_ty,
            "`name` belongs on the primary #[profiled] block, not on `extend` blocks",
        ));
    }

    let krate = &options.krate;
    let mut decls = Vec::new();
    let mut items = Vec::with_capacity(item.items.len() * 2);
    for impl_item in std::mem::take(&mut item.items) {
        let ImplItem::Fn(mut method) = impl_item else {
            items.push(impl_item);
            continue;
        };

        if take_skip(&mut method.attrs)? {
            items.push(ImplItem::Fn(method));
            continue;
        }

        let wrapped = wrap_method(method, krate)?;
        decls.push(wrapped.decl);
        items.push(ImplItem::Fn(wrapped.wrapper));
        items.push(ImplItem::Fn(wrapped.original));
    }
    item.items = items;

    if options.extend {
        return Ok(item.into_token_stream());
    }

    let owner = options
        .name
        .clone()
        .unwrap_or_else(|| owner_name(&item.self_ty));
    let (impl_generics, _, where_clause) = item.generics.split_for_impl();
    let self_ty = &item.self_ty;

    Ok(quote! {
        #item

        impl #impl_generics #krate::Instrumented for #self_ty #where_clause {
            fn method_table() -> &'static #krate::MethodTable {
                const METHODS: &[#krate::MethodDecl] = &[#(#decls),*];
                static TABLE: #krate::MethodTable = #krate::MethodTable::new(#owner, METHODS);
                &TABLE
            }
        }
    })
}

struct WrappedMethod {
    wrapper: ImplItemFn,
    original: ImplItemFn,
    decl: TokenStream2,
}

fn wrap_method(method: ImplItemFn, krate: &Path) -> syn::Result<WrappedMethod> {
    reject_unsupported(&method)?;

    let ident = method.sig.ident.unraw();
    let selector = ident.to_string();
    let inner = format_ident!("__mprof_{}", ident);
    let public = !matches!(method.vis, Visibility::Inherited);
    let kind = format_ident!("{}", method_kind(&method));
    let cfgs: Vec<&Attribute> = method
        .attrs
        .iter()
        .filter(|attr| attr.path().is_ident("cfg"))
        .collect();

    let decl_expr = quote! {
        #krate::MethodDecl::new(#selector, #krate::MethodKind::#kind, #public)
    };
    let decl = quote!(#(#cfgs)* #decl_expr);

    let mut original = method.clone();
    original.sig.ident = inner.clone();
    original.vis = Visibility::Inherited;
    original.attrs = method
        .attrs
        .iter()
        .filter(|attr| is_forwarded(attr))
        .cloned()
        .collect();
    original.attrs.push(parse_quote!(#[doc(hidden)]));
    original.attrs.push(parse_quote!(#[inline(always)]));

    let mut wrapper = method;
    let mut forwarded = Vec::with_capacity(wrapper.sig.inputs.len());
    for (position, input) in wrapper.sig.inputs.iter_mut().enumerate() {
        match input {
            FnArg::Receiver(receiver) => {
                // `mut self` only matters to the original body.
                if receiver.reference.is_none() {
                    receiver.mutability = None;
                }
                forwarded.push(quote!(self));
            }
            FnArg::Typed(arg) => {
                let name = format_ident!("__mprof_arg{}", position);
                *arg.pat = parse_quote!(#name);
                forwarded.push(quote!(#name));
            }
        }
    }

    let generic_args: Vec<TokenStream2> = wrapper
        .sig
        .generics
        .params
        .iter()
        .filter_map(|param| match param {
            GenericParam::Type(param) => Some(param.ident.to_token_stream()),
            GenericParam::Const(param) => Some(param.ident.to_token_stream()),
            GenericParam::Lifetime(_) => None,
        })
        .collect();
    let turbofish = if generic_args.is_empty() {
        TokenStream2::new()
    } else {
        quote!(::<#(#generic_args),*>)
    };

    // The guard is dropped after the body returns or while it unwinds.
    wrapper.block = parse_quote!({
        let __mprof_call = <Self as #krate::Instrumented>::method_table().enter(#decl_expr);
        Self::#inner #turbofish(#(#forwarded),*)
    });

    Ok(WrappedMethod {
        wrapper,
        original,
        decl,
    })
}

fn reject_unsupported(method: &ImplItemFn) -> syn::Result<()> {
    let sig = &method.sig;
    let hint = "; mark it #[profiled(skip)] to leave it unwrapped";

    if let Some(token) = &sig.asyncness {
        return Err(Error::new_spanned(
            token,
            format!("#[profiled] cannot wrap async methods{hint}"),
        ));
    }
    if let Some(token) = &sig.constness {
        return Err(Error::new_spanned(
            token,
            format!("#[profiled] cannot wrap const methods{hint}"),
        ));
    }
    if let Some(abi) = &sig.abi {
        return Err(Error::new_spanned(
            abi,
            format!("#[profiled] cannot wrap extern methods{hint}"),
        ));
    }
    if let Some(variadic) = &sig.variadic {
        return Err(Error::new_spanned(
            variadic,
            format!("#[profiled] cannot wrap variadic methods{hint}"),
        ));
    }
    if let ReturnType::Type(_, ty) = &sig.output
        && matches!(**ty, Type::Never(_))
    {
        return Err(Error::new_spanned(
            ty,
            format!("#[profiled] cannot wrap methods returning `!`{hint}"),
        ));
    }
    Ok(())
}

fn method_kind(method: &ImplItemFn) -> &'static str {
    match method.sig.receiver() {
        None => "Associated",
        Some(receiver) => match &*receiver.ty {
            Type::Reference(reference) if reference.mutability.is_some() => "RefMut",
            Type::Reference(_) => "Ref",
            _ => "Owned",
        },
    }
}

/// Attributes that must also apply to the hidden original body
fn is_forwarded(attr: &Attribute) -> bool {
    [
        "cfg",
        "cfg_attr",
        "allow",
        "expect",
        "warn",
        "deny",
        "track_caller",
    ]
        .iter()
        .any(|name| attr.path().is_ident(name))
}

/// Strips `#[profiled(skip)]` from a method, reporting whether it was there.
fn take_skip(attrs: &mut Vec<Attribute>) -> syn::Result<bool> {
    let mut skip = false;
    let mut kept = Vec::with_capacity(attrs.len());

    for attr in attrs.drain(..) {
        if !attr.path().is_ident("profiled") {
            kept.push(attr);
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("expected `skip`"))
            }
        })?;
    }

    *attrs = kept;
    Ok(skip)
}

fn owner_name(ty: &Type) -> String {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.unraw().to_string())
            .unwrap_or_default(),
        Type::Group(group) => owner_name(&group.elem),
        Type::Paren(paren) => owner_name(&paren.elem),
        other => other.to_token_stream().to_string(),
    }
}
