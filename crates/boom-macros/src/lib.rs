//! Procedural macros for the Boom framework.
//!
//! This crate provides:
//!
//! - `#[endpoint]` - Turns an `async fn` into a route handler or middleware
//!   with a statically declared signature
//!
//! # Endpoint Attribute
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use boom_core::{BoomError, Request, Response};
//! use boom_macros::endpoint;
//!
//! #[endpoint]
//! async fn user_details(
//!     user_id: i64,
//!     request: Arc<Request>,
//!     db: Arc<Database>,
//! ) -> Result<Response, BoomError> {
//!     let user = db.user(user_id).await?;
//!     Ok(Response::json(&user)?)
//! }
//!
//! app.route("/users/:user_id", user_details())?;
//! ```
//!
//! The generated code refers to `::boom_core`, so the calling crate must
//! depend on `boom-core`.

mod endpoint;

use proc_macro::TokenStream;
use syn::{ItemFn, parse_macro_input};

/// Declares an endpoint.
///
/// The function is replaced by a constructor of the same name that returns a
/// `boom_core::BoxedCallable`. Its parameters become the callable's
/// signature, in order, and are unpacked from the resolved arguments:
///
/// | parameter type                       | annotation     |
/// |--------------------------------------|----------------|
/// | `i64`, `i32`, `u64`, `u32`, `usize`  | `Int`          |
/// | `f64`, `f32`                         | `Float`        |
/// | `bool`                               | `Bool`         |
/// | `String`                             | `Str`          |
/// | `Option<String>`                     | none           |
/// | `Arc<Request>`                       | `Request`      |
/// | `Parameter`                          | `Parameter`    |
/// | `Arc<T>`                             | type tag of `T` |
/// | any other `T: Clone`                 | type tag of `T` |
///
/// The function may return a `Response`, an `Option<Response>`, `()`, or a
/// `Result` of those whose error converts into `BoxError`.
///
/// # Options
///
/// - `#[endpoint(name = "...")]` - Override the callable name (the default
///   route name)
/// - `#[endpoint(view)]` - Mark the callable as a method view handler
#[proc_macro_attribute]
pub fn endpoint(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = endpoint::EndpointArgs::default();
    let parser = syn::meta::parser(|meta| args.parse(meta));
    parse_macro_input!(attr with parser);
    let func = parse_macro_input!(item as ItemFn);

    match endpoint::expand(args, func) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
