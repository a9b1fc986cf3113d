//! Reverse routing: building URLs from route names.

use std::fmt;

use boom_core::{BoomError, BoomResult};

use super::Router;
use super::path::{Segment, parse_template};

/// A scalar accepted by [`Router::url_for`].
#[derive(Debug, Clone, PartialEq)]
pub enum UrlParam {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for UrlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for UrlParam {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for UrlParam {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for UrlParam {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for UrlParam {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for UrlParam {
                fn from(value: $ty) -> Self {
                    Self::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

/// Extras for [`Router::url_for_with`].
#[derive(Debug, Clone, Default)]
pub struct UrlOptions {
    /// Appended as `#anchor`.
    pub anchor: Option<String>,
    /// Produce an absolute URL.
    pub external: bool,
    /// Scheme of an external URL; `http` when unset. Requires `external`.
    pub scheme: Option<String>,
    /// Host of an external URL.
    pub server: Option<String>,
}

impl UrlOptions {
    pub fn external(server: impl Into<String>) -> Self {
        Self {
            external: true,
            server: Some(server.into()),
            ..Self::default()
        }
    }

    pub fn anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }
}

impl Router {
    /// Builds the path of the route named `name`.
    ///
    /// Each `:token` and `*token` of the template is replaced by the
    /// parameter of the same name; parameters left over become the query
    /// string.
    ///
    /// # Errors
    ///
    /// [`BoomError::UrlBuild`] if the route does not exist, a token has no
    /// value, or a value contains `:` or `*` (or `/` for a `:token`).
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// router.add("/get/:command/:id/*src", [Method::GET], get, RouteOptions::named("get"))?;
    /// let url = router.url_for("get", [
    ///     ("command", UrlParam::from("details")),
    ///     ("id", UrlParam::from(20)),
    ///     ("src", UrlParam::from("my/favicon.ico")),
    /// ])?;
    /// assert_eq!(url, "/get/details/20/my/favicon.ico");
    /// ```
    pub fn url_for<K, V>(
        &self,
        name: &str,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> BoomResult<String>
    where
        K: Into<String>,
        V: Into<UrlParam>,
    {
        self.url_for_with(name, params, &UrlOptions::default())
    }

    /// [`url_for`](Self::url_for) with an anchor and absolute URL support.
    pub fn url_for_with<K, V>(
        &self,
        name: &str,
        params: impl IntoIterator<Item = (K, V)>,
        options: &UrlOptions,
    ) -> BoomResult<String>
    where
        K: Into<String>,
        V: Into<UrlParam>,
    {
        let (template, _) = self
            .find_route_by_name(name)
            .ok_or_else(|| BoomError::UrlBuild(format!("no route named `{name}`")))?;
        if options.scheme.is_some() && !options.external {
            return Err(BoomError::UrlBuild(
                "a scheme requires an external url".to_string(),
            ));
        }

        let mut params: Vec<(String, UrlParam)> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let mut take = |token: &str| -> BoomResult<String> {
            let index = params
                .iter()
                .position(|(k, _)| k == token)
                .ok_or_else(|| {
                    BoomError::UrlBuild(format!(
                        "missing value for `{token}` in route `{name}` ({template})"
                    ))
                })?;
            let value = params.remove(index).1.to_string();
            if value.contains([':', '*']) {
                return Err(BoomError::UrlBuild(format!(
                    "value `{value}` for `{token}` contains `:` or `*`"
                )));
            }
            Ok(value)
        };

        let mut path = String::with_capacity(template.len());
        for segment in parse_template(template)? {
            let part = match segment {
                Segment::Static(literal) => literal,
                Segment::Param(token) => {
                    let value = take(&token)?;
                    if value.is_empty() || value.contains('/') {
                        return Err(BoomError::UrlBuild(format!(
                            "value `{value}` for `:{token}` is not a single path segment"
                        )));
                    }
                    value
                }
                Segment::Wildcard(token) => take(&token)?,
            };
            path.push('/');
            path.push_str(&part);
        }
        if path.is_empty() {
            path.push('/');
        }

        if !params.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.to_string())))
                .finish();
            path.push('?');
            path.push_str(&query);
        }

        if let Some(anchor) = &options.anchor {
            path.push('#');
            path.push_str(anchor);
        }

        if options.external {
            let server = options.server.as_deref().ok_or_else(|| {
                BoomError::UrlBuild("an external url requires a server name".to_string())
            })?;
            let scheme = options.scheme.as_deref().unwrap_or("http");
            return Ok(format!("{scheme}://{server}{path}"));
        }

        Ok(path)
    }
}
