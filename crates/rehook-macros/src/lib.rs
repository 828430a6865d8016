//! Procedural macros for rehook - component definitions.
//!
//! Provides the `#[component]` attribute that turns a render function into a
//! function returning a [`Component`] definition with a stable identity.
//!
//! [`Component`]: https://docs.rs/rehook-core/latest/rehook_core/component/struct.Component.html

mod suggestions;

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{FnArg, Ident, ItemFn, LitStr, Result, ReturnType, Token};

use suggestions::format_unknown_arg_error;

/// Arguments accepted by `#[component(...)]`.
const COMPONENT_ARGS: &[&str] = &["name"];

/// Define a component.
///
/// The annotated function is the render function. It takes either no
/// arguments or a single `&Props`, and returns `Render`. The macro replaces it
/// with a zero-argument function returning the `Component` definition; every
/// call on the same thread returns the same definition, so instances keep
/// their state across renders.
///
/// # Example
///
/// ```ignore
/// use rehook::prelude::*;
///
/// #[component]
/// fn greeting(props: &Props) -> Render {
///     let name = props.get_str("name").unwrap_or("world");
///     Ok(h!("p", Props::new(), "Hello, ", name))
/// }
///
/// #[component(name = "App")]
/// fn app() -> Render {
///     Ok(h!("main", Props::new(), greeting().with_props(Props::new().with("name", "rehook"))))
/// }
/// ```
///
/// The display name defaults to the function name in `PascalCase` and shows
/// up in logs, errors and instance keys.
#[proc_macro_attribute]
pub fn component(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = syn::parse_macro_input!(attr as ComponentArgs);
    let func = syn::parse_macro_input!(item as ItemFn);
    expand_component(args, func)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Parsed `#[component(name = "...")]` arguments.
#[derive(Default)]
struct ComponentArgs {
    name: Option<LitStr>,
}

struct ComponentArg {
    key: Ident,
    value: LitStr,
}

impl Parse for ComponentArg {
    fn parse(input: ParseStream) -> Result<Self> {
        let key: Ident = input.parse()?;
        input.parse::<Token![=]>()?;
        let value: LitStr = input.parse()?;
        Ok(Self { key, value })
    }
}

impl Parse for ComponentArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut args = ComponentArgs::default();
        let parsed = Punctuated::<ComponentArg, Token![,]>::parse_terminated(input)?;
        for arg in parsed {
            let key = arg.key.to_string();
            match key.as_str() {
                "name" if args.name.is_some() => {
                    return Err(syn::Error::new(arg.key.span(), "duplicate argument `name`"));
                }
                "name" => args.name = Some(arg.value),
                _ => {
                    return Err(syn::Error::new(
                        arg.key.span(),
                        format_unknown_arg_error("component", &key, COMPONENT_ARGS),
                    ));
                }
            }
        }
        Ok(args)
    }
}

fn expand_component(args: ComponentArgs, func: ItemFn) -> Result<TokenStream2> {
    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = func;

    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &sig.generics,
            "components cannot be generic; wrap the generic logic in a helper function",
        ));
    }
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(
            asyncness,
            "components cannot be async; read async values through a `Resource` instead",
        ));
    }
    if sig.inputs.len() > 1 {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            "components take at most one argument: `props: &Props`",
        ));
    }
    if let Some(FnArg::Receiver(receiver)) = sig.inputs.first() {
        return Err(syn::Error::new_spanned(
            receiver,
            "components cannot take `self`",
        ));
    }
    if let ReturnType::Default = sig.output {
        return Err(syn::Error::new_spanned(
            &sig.ident,
            "components must return `Render`",
        ));
    }

    let ident = &sig.ident;
    let output = &sig.output;
    let name = args
        .name
        .unwrap_or_else(|| LitStr::new(&to_pascal_case(&ident.to_string()), Span::call_site()));
    let input = match sig.inputs.first() {
        Some(arg) => quote! { #arg },
        None => quote! { _: &::rehook::core::Props },
    };
    let render = format_ident!("__{}_render", ident);

    Ok(quote! {
        #(#attrs)*
        #vis fn #ident() -> ::rehook::core::Component {
            fn #render(#input) #output #block

            ::std::thread_local! {
                static DEFINITION: ::rehook::core::Component =
                    ::rehook::core::Component::new(#name, #render);
            }
            DEFINITION.with(::std::clone::Clone::clone)
        }
    })
}

/// `todo_list` -> `TodoList`.
fn to_pascal_case(name: &str) -> String {
    name.trim_start_matches("r#")
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(attr: TokenStream2, item: TokenStream2) -> Result<String> {
        let args: ComponentArgs = syn::parse2(attr)?;
        let func: ItemFn = syn::parse2(item)?;
        expand_component(args, func).map(|tokens| tokens.to_string())
    }

    #[test]
    fn pascal_case_names() {
        assert_eq!(to_pascal_case("todo_list"), "TodoList");
        assert_eq!(to_pascal_case("app"), "App");
        assert_eq!(to_pascal_case("_private_row"), "PrivateRow");
    }

    #[test]
    fn zero_arg_components_get_a_props_parameter() {
        let out = expand(quote! {}, quote! { fn app() -> Render { todo!() } }).unwrap();
        assert!(out.contains("__app_render"));
        assert!(out.contains(":: rehook :: core :: Props"));
        assert!(out.contains("\"App\""));
    }

    #[test]
    fn explicit_name_wins() {
        let out = expand(
            quote! { name = "Root" },
            quote! { pub fn app(props: &Props) -> Render { todo!() } },
        )
        .unwrap();
        assert!(out.contains("\"Root\""));
        assert!(out.contains("pub fn app"));
    }

    #[test]
    fn rejects_unsupported_signatures() {
        let generic = expand(quote! {}, quote! { fn list<T>() -> Render { todo!() } });
        assert!(generic.is_err());

        let two_args = expand(quote! {}, quote! { fn row(a: &Props, b: u32) -> Render { todo!() } });
        assert!(two_args.is_err());

        let asynchronous = expand(quote! {}, quote! { async fn load() -> Render { todo!() } });
        assert!(asynchronous.is_err());
    }

    #[test]
    fn unknown_argument_suggests_closest() {
        let Err(err) = syn::parse2::<ComponentArgs>(quote! { nmae = "X" }) else {
            panic!("expected an error");
        };
        assert!(err.to_string().contains("Did you mean `name`?"));
    }
}
