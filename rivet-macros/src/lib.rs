use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;

use syn::spanned::Spanned as _;
use syn::{
    Attribute, Data, DeriveInput, Error, Expr, FnArg, GenericArgument, Ident, ImplItem,
    ItemImpl, ItemStruct, LitStr, Pat, PathArguments, Type, parse_macro_input,
};

const INJECT_ATTR: &str = "inject";
const FACTORY_ATTR: &str = "factory";

fn extract_wrapped_type(ty: &Type, wrapper: &str) -> Option<Type> {
    if let Type::Path(type_path) = ty
        && let Some(segment) = type_path.path.segments.last()
        && segment.ident == wrapper
        && let PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(GenericArgument::Type(inner)) = args.args.first()
    {
        return Some(inner.clone());
    }
    None
}

fn extract_arc_type(ty: &Type) -> Option<Type> {
    extract_wrapped_type(ty, "Arc")
}

#[derive(Default)]
struct InjectOptions {
    variadic: bool,
    untyped: bool,
    markers: Vec<LitStr>,
    default: Option<Expr>,
}

fn parse_inject_options(attrs: &[Attribute]) -> syn::Result<InjectOptions> {
    let mut options = InjectOptions::default();
    for attr in attrs {
        if !attr.path().is_ident(INJECT_ATTR) {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("variadic") {
                options.variadic = true;
                Ok(())
            } else if meta.path.is_ident("untyped") {
                options.untyped = true;
                Ok(())
            } else if meta.path.is_ident("marker") {
                options.markers.push(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("default") {
                options.default = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error(format!(
                    "Unsupported #[{INJECT_ATTR}] option, expected one of: variadic, untyped, marker, default"
                )))
            }
        })?;
    }
    Ok(options)
}

/// Builds the parameter metadata and the argument extraction for one
/// injected field or factory argument.
fn injected_parameter(
    name: &Ident,
    ty: &Type,
    attrs: &[Attribute],
) -> syn::Result<(TokenStream2, TokenStream2)> {
    let options = parse_inject_options(attrs)?;
    let param_name = name.to_string();
    let markers = &options.markers;

    // Type declaration, optional default and extraction for each supported shape.
    let (typed, default, extract) = if options.variadic {
        let inner = extract_wrapped_type(ty, "Vec")
            .and_then(|item| extract_arc_type(&item))
            .ok_or_else(|| Error::new(ty.span(), "Variadic arguments must be of type Vec<Arc<T>>"))?;
        (
            quote! { .typed::<#inner>() },
            quote! { .variadic() },
            quote! { args.rest::<#inner>()? },
        )
    } else if let Some(inner) =
        extract_wrapped_type(ty, "Option").and_then(|item| extract_arc_type(&item))
    {
        (
            quote! { .typed::<#inner>() },
            quote! { .optional(::rivet::Value::null()) },
            quote! { args.take_optional::<#inner>()? },
        )
    } else if let Some(inner) = extract_arc_type(ty) {
        let default = options
            .default
            .as_ref()
            .map(|expr| quote! { .optional(::rivet::Value::new::<#inner>(#expr)) });
        (
            quote! { .typed::<#inner>() },
            quote! { #default },
            quote! { args.take::<#inner>()? },
        )
    } else {
        let default = options
            .default
            .as_ref()
            .map(|expr| quote! { .optional(::rivet::Value::new::<#ty>(#expr)) });
        (
            quote! { .typed::<#ty>() },
            quote! { #default },
            quote! { args.take_cloned::<#ty>()? },
        )
    };
    let declared = if options.untyped {
        default
    } else {
        quote! { #typed #default }
    };

    let parameter = quote! {
        ::rivet::Parameter::new(#param_name) #declared #(.marker(#markers))*
    };
    Ok((parameter, extract))
}

/// Derive macro for the `Injectable` trait.
///
/// Every named field becomes one constructor parameter named after the field.
/// `Arc<T>` fields are autowired by `T`, `Option<Arc<T>>` fields are optional,
/// any other field type is cloned out of the provided value. Fields accept
/// `#[inject(marker = "..", default = .., variadic, untyped)]`.
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    handle_derive_injectable(input).unwrap_or_else(|err| err.to_compile_error().into())
}

/// Attribute macro for impl blocks with one `#[factory]` function.
#[proc_macro_attribute]
pub fn injectable(_attr: TokenStream, item: TokenStream) -> TokenStream {
    if let Ok(item_impl) = syn::parse::<ItemImpl>(item) {
        return handle_injectable_impl(item_impl)
            .unwrap_or_else(|err| err.to_compile_error().into());
    }
    TokenStream::from(
        Error::new(
            proc_macro2::Span::call_site(),
            "#[injectable] can only be applied to impl blocks",
        )
        .to_compile_error(),
    )
}

/// Attribute macro implementing `ConfigSection` with the given key.
#[proc_macro_attribute]
pub fn config_section(args: TokenStream, input: TokenStream) -> TokenStream {
    let key_arg = parse_macro_input!(args as LitStr);
    let input_struct = parse_macro_input!(input as ItemStruct);

    let struct_name = &input_struct.ident;
    let key = key_arg.value();

    let expanded = quote! {
        #input_struct

        impl ::rivet_base::ConfigSection for #struct_name {
            fn key() -> &'static str {
                #key
            }
        }
    };

    TokenStream::from(expanded)
}

fn handle_derive_injectable(input: DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "Generic structs are not supported",
        ));
    }
    let fields = match &input.data {
        Data::Struct(s) => &s.fields,
        _ => return Err(Error::new(name.span(), "Only structs are supported")),
    };

    let mut parameters = Vec::new();
    let mut field_lets = Vec::new();
    let mut field_inits = Vec::new();

    match fields {
        syn::Fields::Named(fields) => {
            for field in &fields.named {
                let Some(field_ident) = field.ident.as_ref() else {
                    continue;
                };
                let (parameter, extract) =
                    injected_parameter(field_ident, &field.ty, &field.attrs)?;
                parameters.push(parameter);
                field_lets.push(quote! { let #field_ident = #extract; });
                field_inits.push(quote! { #field_ident });
            }
        }
        syn::Fields::Unnamed(_) => {
            return Err(Error::new(name.span(), "Tuple structs are not supported"));
        }
        syn::Fields::Unit => {}
    }

    Ok(quote! {
        impl ::rivet::Injectable for #name {
            #[allow(unused_mut, unused_variables)]
            fn executable() -> ::rivet::Executable {
                ::rivet::Executable::new(
                    ::std::any::type_name::<Self>(),
                    |mut args: ::rivet::Args| -> ::std::result::Result<::rivet::Value, ::rivet::StdError> {
                        #(#field_lets)*
                        Ok(::rivet::Value::new(Self {
                            #(#field_inits,)*
                        }))
                    },
                )
                .returns::<Self>()
                #(.param(#parameters))*
            }
        }
    }
    .into())
}

fn handle_injectable_impl(input: ItemImpl) -> syn::Result<TokenStream> {
    if input.trait_.is_some() {
        return Err(Error::new(input.span(), "Trait impls are not supported"));
    }

    let self_ty = &input.self_ty;
    let mut factory_method = None;

    for item in &input.items {
        if let ImplItem::Fn(method) = item {
            for attr in &method.attrs {
                if attr.path().is_ident(FACTORY_ATTR) {
                    if factory_method.is_some() {
                        return Err(Error::new(attr.span(), "Only one factory method allowed"));
                    }
                    factory_method = Some(method);
                }
            }
        }
    }

    let Some(method) = factory_method else {
        return Err(Error::new(input.span(), "No factory method found"));
    };

    if method.sig.asyncness.is_some() {
        return Err(Error::new(
            method.sig.span(),
            "Factory methods must be synchronous",
        ));
    }

    let method_name = &method.sig.ident;
    let return_type = match &method.sig.output {
        syn::ReturnType::Default => {
            return Err(Error::new(
                method.sig.span(),
                "Factory method must have a return type",
            ));
        }
        syn::ReturnType::Type(_, ty) => ty.as_ref(),
    };
    let (handle_type, is_result) = extract_handle_type(return_type);
    let is_arc = extract_arc_type(&handle_type).is_some();

    let mut parameters = Vec::new();
    let mut arg_lets = Vec::new();
    let mut arg_names = Vec::new();
    let mut cleaned_inputs = Vec::new();

    for fn_arg in &method.sig.inputs {
        match fn_arg {
            FnArg::Receiver(_) => {
                return Err(Error::new(
                    fn_arg.span(),
                    "Factory method cannot have self parameter",
                ));
            }
            FnArg::Typed(pat_type) => {
                let mut cleaned_pat_type = pat_type.clone();
                cleaned_pat_type
                    .attrs
                    .retain(|attr| !attr.path().is_ident(INJECT_ATTR));
                cleaned_inputs.push(FnArg::Typed(cleaned_pat_type));

                let Pat::Ident(pat_ident) = pat_type.pat.as_ref() else {
                    return Err(Error::new(
                        pat_type.pat.span(),
                        "Only simple bindings supported",
                    ));
                };
                let arg_name = &pat_ident.ident;
                let (parameter, extract) =
                    injected_parameter(arg_name, &pat_type.ty, &pat_type.attrs)?;
                parameters.push(parameter);
                arg_lets.push(quote! { let #arg_name = #extract; });
                arg_names.push(quote! { #arg_name });
            }
        }
    }

    // Strip helper attributes, they are not known to the compiler.
    let mut cleaned_input = input.clone();
    for item in &mut cleaned_input.items {
        if let ImplItem::Fn(method) = item
            && method
                .attrs
                .iter()
                .any(|attr| attr.path().is_ident(FACTORY_ATTR))
        {
            method.sig.inputs = cleaned_inputs.into_iter().collect();
            method
                .attrs
                .retain(|attr| !attr.path().is_ident(FACTORY_ATTR));
            break;
        }
    }

    let method_call = if is_result {
        quote! {
            Self::#method_name(#(#arg_names),*)
                .map_err(::std::convert::Into::<::rivet::StdError>::into)?
        }
    } else {
        quote! { Self::#method_name(#(#arg_names),*) }
    };
    let wrap = if is_arc {
        quote! { ::rivet::Value::from_arc(handle) }
    } else {
        quote! { ::rivet::Value::new(handle) }
    };

    Ok(quote! {
        #cleaned_input

        impl ::rivet::Injectable for #self_ty {
            #[allow(unused_mut, unused_variables)]
            fn executable() -> ::rivet::Executable {
                ::rivet::Executable::new(
                    format!("{}::{}", ::std::any::type_name::<Self>(), stringify!(#method_name)),
                    |mut args: ::rivet::Args| -> ::std::result::Result<::rivet::Value, ::rivet::StdError> {
                        #(#arg_lets)*
                        let handle: #handle_type = #method_call;
                        Ok(#wrap)
                    },
                )
                .returns::<Self>()
                #(.param(#parameters))*
            }
        }
    }
    .into())
}

fn extract_handle_type(ty: &Type) -> (Type, bool) {
    if let Some(inner) = extract_wrapped_type(ty, "Result") {
        return (inner, true);
    }
    (ty.clone(), false)
}
