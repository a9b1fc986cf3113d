//! Statically declared parameter lists.
//!
//! Handlers, middlewares and component `fetch` functions describe the
//! parameters they want filled with a [`Signature`]. Signatures are built once
//! at registration time, either by hand through [`SignatureBuilder`] or by the
//! `#[endpoint]` attribute, and never change afterwards.
//!
//! Every built signature receives a process-unique [`CallableId`] and every
//! parameter receives a [`ParamKey`] of `(callable, position)`. Two parameters
//! named `id` on two different handlers therefore are different keys for the
//! resolver's component memo and for the endpoint cache store. The request
//! and worker stores key on the structural [`ParamSlot`] instead.
//!
//! # Example
//!
//! ```rust,ignore
//! use boom_core::Signature;
//!
//! let sig = Signature::builder("user_details")
//!     .int("user_id")
//!     .request("request")
//!     .param::<Database>("db")
//!     .build();
//! ```

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::request::Request;
use crate::value::TypeTag;

/// Identity of one declared callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallableId(u64);

impl CallableId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of one declared parameter site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamKey {
    /// The declaring callable.
    pub callable: CallableId,
    /// Position in the declaration.
    pub index: usize,
}

/// The declared type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Annotation {
    /// No annotation; prefetched values pass through as strings.
    #[default]
    Empty,
    /// Integer scalar (`i64`).
    Int,
    /// Floating point scalar (`f64`).
    Float,
    /// Boolean scalar.
    Bool,
    /// String scalar.
    Str,
    /// The current request.
    Request,
    /// The raw parameter descriptor.
    Parameter,
    /// A concrete Rust type.
    Type(TypeTag),
    /// A parameterized type such as `JsonBody<T>`: the origin tag plus the
    /// embedded argument tag.
    Generic {
        /// The generic type itself.
        origin: TypeTag,
        /// Its type argument.
        arg: TypeTag,
    },
}

impl Annotation {
    /// Annotation for a concrete type.
    ///
    /// `Request` and `Parameter` (bare or in an `Arc`) map to
    /// [`Annotation::Request`] and [`Annotation::Parameter`].
    pub fn of<T: Any + ?Sized>() -> Self {
        let tag = TypeTag::of::<T>();
        if tag.is::<Request>() || tag.is::<Arc<Request>>() {
            Self::Request
        } else if tag.is::<Parameter>() || tag.is::<Arc<Parameter>>() {
            Self::Parameter
        } else {
            Self::Type(tag)
        }
    }

    /// Annotation for a generic origin `O` applied to `A`.
    pub fn generic<O: Any + ?Sized, A: Any + ?Sized>() -> Self {
        Self::Generic {
            origin: TypeTag::of::<O>(),
            arg: TypeTag::of::<A>(),
        }
    }

    /// The type (or generic origin) this annotation names, if any.
    pub fn origin(&self) -> Option<TypeTag> {
        match self {
            Self::Type(tag) => Some(*tag),
            Self::Generic { origin, .. } => Some(*origin),
            _ => None,
        }
    }

    /// The generic argument, if any.
    pub fn arg(&self) -> Option<TypeTag> {
        match self {
            Self::Generic { arg, .. } => Some(*arg),
            _ => None,
        }
    }

    /// Returns `true` if the annotation (or its generic origin) is `T`.
    pub fn is<T: Any + ?Sized>(&self) -> bool {
        self.origin().is_some_and(|tag| tag.is::<T>())
    }
}

/// How a parameter binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamKind {
    /// A regular named parameter.
    #[default]
    Ordinary,
    /// Collects leftover positional arguments.
    VarPositional,
    /// Collects leftover keyword arguments.
    VarKeyword,
}

/// Structural description of a parameter: name, annotation and kind.
///
/// Unlike [`ParamKey`], two parameters declared the same way on different
/// callables share a slot. Request and worker cache stores key on the slot,
/// so a middleware and a handler asking for the same `req_id: RequestId`
/// observe the same cached value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamSlot {
    name: Arc<str>,
    annotation: Annotation,
    kind: ParamKind,
}

impl ParamSlot {
    pub fn name(&self) -> &str {
        &self.name
    }
}

struct ParameterInner {
    key: ParamKey,
    name: Arc<str>,
    annotation: Annotation,
    kind: ParamKind,
    callable_name: Arc<str>,
}

/// One declared parameter.
///
/// Cloning is cheap. Equality and hashing use the [`ParamKey`] only.
#[derive(Clone)]
pub struct Parameter(Arc<ParameterInner>);

impl Parameter {
    /// Identity of this parameter site.
    pub fn key(&self) -> ParamKey {
        self.0.key
    }

    /// Declared name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Structural slot of this parameter.
    pub fn slot(&self) -> ParamSlot {
        ParamSlot {
            name: Arc::clone(&self.0.name),
            annotation: self.0.annotation,
            kind: self.0.kind,
        }
    }

    /// Declared annotation.
    pub fn annotation(&self) -> Annotation {
        self.0.annotation
    }

    /// Declared kind.
    pub fn kind(&self) -> ParamKind {
        self.0.kind
    }

    /// Name of the callable that declares this parameter.
    pub fn callable_name(&self) -> &str {
        &self.0.callable_name
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.0.key == other.0.key
    }
}

impl Eq for Parameter {}

impl Hash for Parameter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.key.hash(state);
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.0.name)
            .field("annotation", &self.0.annotation)
            .field("kind", &self.0.kind)
            .field("callable", &self.0.callable_name)
            .finish()
    }
}

/// The ordered parameter list of a callable.
#[derive(Clone)]
pub struct Signature {
    id: CallableId,
    name: Arc<str>,
    params: Arc<[Parameter]>,
    view_method: bool,
}

impl Signature {
    /// Starts declaring a callable named `name`.
    pub fn builder(name: impl Into<String>) -> SignatureBuilder {
        SignatureBuilder {
            name: name.into(),
            params: Vec::new(),
            view_method: false,
        }
    }

    /// A callable that takes nothing.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    /// Process-unique identity.
    pub fn id(&self) -> CallableId {
        self.id
    }

    /// Callable name, used for route names and diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameters in order.
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Looks a parameter up by name.
    pub fn param(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name() == name)
    }

    /// Returns `true` for methods of a class-based view.
    pub fn is_view_method(&self) -> bool {
        self.view_method
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("view_method", &self.view_method)
            .finish()
    }
}

/// Builder for [`Signature`].
#[derive(Debug)]
#[must_use]
pub struct SignatureBuilder {
    name: String,
    params: Vec<(String, Annotation, ParamKind)>,
    view_method: bool,
}

impl SignatureBuilder {
    /// Declares a parameter with an explicit annotation and kind.
    pub fn declare(
        mut self,
        name: impl Into<String>,
        annotation: Annotation,
        kind: ParamKind,
    ) -> Self {
        self.params.push((name.into(), annotation, kind));
        self
    }

    /// Declares an ordinary parameter with the given annotation.
    pub fn annotated(self, name: impl Into<String>, annotation: Annotation) -> Self {
        self.declare(name, annotation, ParamKind::Ordinary)
    }

    /// Declares a parameter of type `T`.
    pub fn param<T: Any + ?Sized>(self, name: impl Into<String>) -> Self {
        self.annotated(name, Annotation::of::<T>())
    }

    /// Declares a parameter of generic type `O<A>`.
    pub fn generic<O: Any + ?Sized, A: Any + ?Sized>(self, name: impl Into<String>) -> Self {
        self.annotated(name, Annotation::generic::<O, A>())
    }

    /// Declares an unannotated parameter.
    pub fn untyped(self, name: impl Into<String>) -> Self {
        self.annotated(name, Annotation::Empty)
    }

    pub fn int(self, name: impl Into<String>) -> Self {
        self.annotated(name, Annotation::Int)
    }

    pub fn float(self, name: impl Into<String>) -> Self {
        self.annotated(name, Annotation::Float)
    }

    pub fn bool(self, name: impl Into<String>) -> Self {
        self.annotated(name, Annotation::Bool)
    }

    pub fn string(self, name: impl Into<String>) -> Self {
        self.annotated(name, Annotation::Str)
    }

    /// Declares a parameter that receives the current request.
    pub fn request(self, name: impl Into<String>) -> Self {
        self.annotated(name, Annotation::Request)
    }

    /// Declares a parameter that receives the parameter being filled.
    pub fn parameter(self, name: impl Into<String>) -> Self {
        self.annotated(name, Annotation::Parameter)
    }

    pub fn var_positional(self, name: impl Into<String>) -> Self {
        self.declare(name, Annotation::Empty, ParamKind::VarPositional)
    }

    pub fn var_keyword(self, name: impl Into<String>) -> Self {
        self.declare(name, Annotation::Empty, ParamKind::VarKeyword)
    }

    /// Marks the callable as a method of a class-based view.
    pub fn view_method(mut self) -> Self {
        self.view_method = true;
        self
    }

    /// Finishes the declaration, assigning fresh identities.
    pub fn build(self) -> Signature {
        let id = CallableId::next();
        let callable_name: Arc<str> = Arc::from(self.name);
        let params = self
            .params
            .into_iter()
            .enumerate()
            .map(|(index, (name, annotation, kind))| {
                Parameter(Arc::new(ParameterInner {
                    key: ParamKey {
                        callable: id,
                        index,
                    },
                    name: Arc::from(name),
                    annotation,
                    kind,
                    callable_name: Arc::clone(&callable_name),
                }))
            })
            .collect();

        Signature {
            id,
            name: callable_name,
            params,
            view_method: self.view_method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct JsonBody<T>(T);
    struct User;

    #[test]
    fn test_same_name_different_callables_are_distinct() {
        let a = Signature::builder("a").int("id").build();
        let b = Signature::builder("b").int("id").build();

        assert_ne!(a.id(), b.id());
        assert_ne!(a.params()[0], b.params()[0]);
        assert_eq!(a.params()[0], a.param("id").unwrap().clone());
        assert_eq!(a.params()[0].slot(), b.params()[0].slot());
    }

    #[test]
    fn test_generic_annotation() {
        let sig = Signature::builder("create")
            .generic::<JsonBody<()>, User>("body")
            .build();
        let annotation = sig.params()[0].annotation();

        assert!(annotation.is::<JsonBody<()>>());
        assert!(annotation.arg().unwrap().is::<User>());
        let _ = JsonBody(());
    }

    #[test]
    fn test_kinds_and_view_flag() {
        let sig = Signature::builder("get")
            .var_positional("args")
            .var_keyword("kwargs")
            .view_method()
            .build();

        assert!(sig.is_view_method());
        assert_eq!(sig.params()[0].kind(), ParamKind::VarPositional);
        assert_eq!(sig.params()[1].kind(), ParamKind::VarKeyword);
        assert_eq!(sig.params()[1].callable_name(), "get");
    }

    #[test]
    fn test_request_and_parameter_types_use_dedicated_annotations() {
        let sig = Signature::builder("handler")
            .param::<Request>("r")
            .param::<Arc<Request>>("shared")
            .param::<Parameter>("p")
            .param::<User>("user")
            .build();
        let annotations: Vec<_> = sig.params().iter().map(|p| p.annotation()).collect();

        assert_eq!(annotations[0], Annotation::Request);
        assert_eq!(annotations[1], Annotation::Request);
        assert_eq!(annotations[2], Annotation::Parameter);
        assert!(annotations[3].is::<User>());
    }
}
