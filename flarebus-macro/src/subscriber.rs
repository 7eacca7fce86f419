use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    Attribute, Expr, FnArg, GenericArgument, Ident, ImplItem, ImplItemFn, ItemImpl, LitStr,
    PathArguments, Type, parse_macro_input, spanned::Spanned,
};

/// Most extra arguments a listener may take after the event.
const MAX_EXTRA_ARGS: usize = 4;

/// A `#[listener]` method
struct ListenerInfo {
    method: Ident,
    label: String,
    priority: Expr,
    event: Type,
    extras: Vec<Type>,
}

fn is_listener_attr(attr: &Attribute) -> bool {
    attr.path().is_ident("listener")
}

/// Parse `#[listener]` / `#[listener(priority = EXPR, label = "name")]`
fn parse_listener_attr(attr: &Attribute, method: &Ident) -> syn::Result<(Expr, String)> {
    let mut priority: Expr = syn::parse_quote!(0);
    let mut label = method.to_string();

    if attr.meta.require_list().is_ok() {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("priority") {
                priority = meta.value()?.parse()?;
                Ok(())
            } else if meta.path.is_ident("label") {
                label = meta.value()?.parse::<LitStr>()?.value();
                Ok(())
            } else {
                Err(meta.error("expected `priority` or `label`"))
            }
        })?;
    }

    Ok((priority, label))
}

/// `&T` -> `T`
fn referenced_type(ty: &Type) -> Option<Type> {
    match ty {
        Type::Reference(reference) if reference.mutability.is_none() => {
            Some((*reference.elem).clone())
        }
        _ => None,
    }
}

/// `Option<&T>` -> `T`
fn optional_referenced_type(ty: &Type) -> Option<Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }

    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first() {
        Some(GenericArgument::Type(inner)) if args.args.len() == 1 => referenced_type(inner),
        _ => None,
    }
}

/// Extract listener information from a method, if it carries `#[listener]`
fn extract_listener_info(method: &ImplItemFn) -> syn::Result<Option<ListenerInfo>> {
    let Some(attr) = method.attrs.iter().find(|attr| is_listener_attr(attr)) else {
        return Ok(None);
    };

    let sig = &method.sig;
    let name = sig.ident.clone();
    let (priority, label) = parse_listener_attr(attr, &name)?;

    if sig.asyncness.is_some() {
        return Err(syn::Error::new(sig.span(), "listeners cannot be async"));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            sig.generics.span(),
            "listeners cannot be generic",
        ));
    }

    let mut inputs = sig.inputs.iter();
    match inputs.next() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(syn::Error::new(
                sig.span(),
                "listeners must take `&self` as their first parameter",
            ));
        }
    }

    let event = match inputs.next() {
        Some(FnArg::Typed(pat_type)) => referenced_type(&pat_type.ty).ok_or_else(|| {
            syn::Error::new(pat_type.ty.span(), "the event parameter must be `&EventType`")
        })?,
        _ => {
            return Err(syn::Error::new(
                sig.span(),
                "listeners must take the event as `&EventType` after `&self`",
            ));
        }
    };

    let mut extras = Vec::new();
    for input in inputs {
        let FnArg::Typed(pat_type) = input else {
            continue;
        };
        let extra = optional_referenced_type(&pat_type.ty).ok_or_else(|| {
            syn::Error::new(
                pat_type.ty.span(),
                "extra listener parameters must be `Option<&T>`",
            )
        })?;
        extras.push(extra);
    }

    if extras.len() > MAX_EXTRA_ARGS {
        return Err(syn::Error::new(
            sig.inputs.span(),
            format!("listeners take at most {MAX_EXTRA_ARGS} extra parameters"),
        ));
    }

    Ok(Some(ListenerInfo {
        method: name,
        label,
        priority,
        event,
        extras,
    }))
}

/// Generate the binder call for one listener
fn generate_binding(info: &ListenerInfo) -> TokenStream2 {
    let ListenerInfo {
        method,
        label,
        priority,
        event,
        extras,
    } = info;

    if extras.is_empty() {
        return quote! {
            {
                let this = ::std::sync::Arc::clone(self);
                binder
                    .with_label(#label)
                    .listen::<#event, _, _>(#priority, move |event: &#event| this.#method(event))?;
            }
        };
    }

    let args: Vec<Ident> = (0..extras.len()).map(|i| format_ident!("arg{}", i)).collect();
    quote! {
        {
            let this = ::std::sync::Arc::clone(self);
            binder
                .with_label(#label)
                .listen_wrapped::<#event, (#(#extras,)*), _>(
                    #priority,
                    move |event: &#event, #(#args: ::std::option::Option<&#extras>),*| {
                        this.#method(event, #(#args),*)
                    },
                )?;
        }
    }
}

pub fn subscriber_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    let _ = attr; // No attributes expected
    let mut input = parse_macro_input!(item as ItemImpl);

    if let Some((_, path, _)) = &input.trait_ {
        return syn::Error::new(
            path.span(),
            "#[subscriber] goes on an inherent impl block",
        )
        .to_compile_error()
        .into();
    }

    let mut bindings: Vec<TokenStream2> = Vec::new();
    let mut errors: Vec<TokenStream2> = Vec::new();

    for item in &mut input.items {
        if let ImplItem::Fn(method) = item {
            match extract_listener_info(method) {
                Ok(Some(info)) => bindings.push(generate_binding(&info)),
                Ok(None) => {}
                Err(err) => errors.push(err.to_compile_error()),
            }
            method.attrs.retain(|attr| !is_listener_attr(attr));
        }
    }

    if !errors.is_empty() {
        return quote! {
            #input
            #(#errors)*
        }
        .into();
    }

    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        #input

        impl #impl_generics ::flarebus::Subscriber for #self_ty #where_clause {
            #[allow(unused_variables)]
            fn bind(
                self: &::std::sync::Arc<Self>,
                binder: &mut ::flarebus::Binder<'_>,
            ) -> ::std::result::Result<(), ::flarebus::BindError> {
                #(#bindings)*
                ::std::result::Result::Ok(())
            }
        }
    };

    TokenStream::from(expanded)
}
