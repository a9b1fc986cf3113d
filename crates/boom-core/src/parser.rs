//! Scalar coercion of prefetched path parameters.

use crate::error::{BoomError, BoomResult};
use crate::signature::{Annotation, Parameter};
use crate::value::Value;

/// Strings that parse to `true` for a bool-annotated parameter.
///
/// Anything else, including typos such as `"tru"`, parses to `false`.
pub const AFFIRMATIVE: [&str; 3] = ["true", "yes", "ok"];

/// Signature of a scalar coercion function.
pub type ParamParser = fn(&str, &Parameter) -> BoomResult<Value>;

/// Coerces a raw path value according to the parameter's annotation.
///
/// - `Int` / `Float`: parsed as `i64` / `f64`; malformed input is an
///   [`InvalidParameter`](BoomError::InvalidParameter) error (400 class).
/// - `Bool`: case-insensitive membership in [`AFFIRMATIVE`].
/// - Anything else: the raw string, unchanged.
pub fn param_parser(raw: &str, param: &Parameter) -> BoomResult<Value> {
    let invalid = |reason: String| BoomError::InvalidParameter {
        name: param.name().to_string(),
        value: raw.to_string(),
        reason,
    };

    match param.annotation() {
        Annotation::Int => raw
            .trim()
            .parse::<i64>()
            .map(Value::new)
            .map_err(|e| invalid(e.to_string())),
        Annotation::Float => raw
            .trim()
            .parse::<f64>()
            .map(Value::new)
            .map_err(|e| invalid(e.to_string())),
        Annotation::Bool => Ok(Value::new(
            AFFIRMATIVE
                .iter()
                .any(|word| word.eq_ignore_ascii_case(raw)),
        )),
        _ => Ok(Value::new(raw.to_string())),
    }
}
