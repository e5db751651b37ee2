//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了ctxcache的宏实现，为查询类型派生缓存键与TTL。
//!
//! ```ignore
//! #[derive(KeyedQuery)]
//! #[keyed_query(prefix = "cal", ttl_secs = 2592000)]
//! struct CalendarQuery {
//!     community: String,
//!     region: String,
//!     language: Option<String>,
//!     date: chrono::NaiveDate,
//!     #[keyed_query(skip)]
//!     trace_id: String,
//! }
//! ```
//!
//! 键段按字段声明顺序排列，上下文键应依次声明社区、地区、语言字段。

use darling::{ast, FromDeriveInput, FromField};
use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, Ident};

#[derive(FromDeriveInput)]
#[darling(attributes(keyed_query), supports(struct_named))]
struct KeyedQueryOpts {
    ident: Ident,
    generics: syn::Generics,
    data: ast::Data<(), FieldOpts>,
    /// 键的类型前缀，默认取结构体名的蛇形命名
    #[darling(default)]
    prefix: Option<String>,
    /// 固定TTL，缺省时使用执行器配置的TTL策略
    #[darling(default)]
    ttl_secs: Option<u64>,
    /// 指标端点，缺省时取前缀
    #[darling(default)]
    endpoint: Option<String>,
}

#[derive(FromField)]
#[darling(attributes(keyed_query))]
struct FieldOpts {
    ident: Option<Ident>,
    /// 不参与键构造的字段
    #[darling(default)]
    skip: bool,
}

fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[proc_macro_derive(KeyedQuery, attributes(keyed_query))]
pub fn derive_keyed_query(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let opts = match KeyedQueryOpts::from_derive_input(&input) {
        Ok(opts) => opts,
        Err(e) => return e.write_errors().into(),
    };

    let ident = &opts.ident;
    let (impl_generics, ty_generics, where_clause) = opts.generics.split_for_impl();

    let prefix = opts
        .prefix
        .clone()
        .unwrap_or_else(|| snake_case(&ident.to_string()))
        .trim()
        .to_lowercase();
    if prefix.is_empty() {
        return syn::Error::new_spanned(ident, "keyed_query prefix cannot be empty")
            .to_compile_error()
            .into();
    }

    let fields: Vec<&Ident> = match &opts.data {
        ast::Data::Struct(fields) => fields
            .iter()
            .filter(|f| !f.skip)
            .filter_map(|f| f.ident.as_ref())
            .collect(),
        ast::Data::Enum(_) => Vec::new(),
    };

    // 未指定 ttl_secs 时由执行器按配置的TTL策略取值
    let (ttl, fixed) = match opts.ttl_secs {
        Some(0) => {
            return syn::Error::new_spanned(ident, "keyed_query ttl_secs must be greater than zero")
                .to_compile_error()
                .into()
        }
        Some(secs) => (quote! { ::std::time::Duration::from_secs(#secs) }, true),
        None => (
            quote! { ::ctxcache::query::TtlPolicy::default().ttl_for_key(#prefix) },
            false,
        ),
    };

    let endpoint = opts.endpoint.as_ref().map(|endpoint| {
        quote! {
            fn endpoint(&self) -> ::ctxcache::metrics::EndpointId {
                ::ctxcache::metrics::EndpointId::from(#endpoint)
            }
        }
    });

    let expanded = quote! {
        impl #impl_generics ::ctxcache::query::KeyedQuery for #ident #ty_generics #where_clause {
            fn cache_key(&self) -> ::ctxcache::key::CacheKey {
                ::ctxcache::key::KeyBuilder::new(#prefix)
                    #( .segment(&self.#fields) )*
                    .build()
            }

            fn cache_ttl(&self) -> ::std::time::Duration {
                #ttl
            }

            fn has_fixed_ttl(&self) -> bool {
                #fixed
            }

            #endpoint
        }
    };

    expanded.into()
}
