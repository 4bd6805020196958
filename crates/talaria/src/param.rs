//! Typed action arguments.
//!
//! Argument specs are declared at registration and resolved right before the
//! action runs: each spec names a value source, whether it is required, and
//! an optional default. The bound values are stowed on the context under a
//! fixed data key so the action can read them back as [`BoundArgs`].

use indexmap::IndexMap;

use talaria_core::{Context, Interrupt};

/// Context data key the bound arguments are stowed under.
const ARGS_DATA_KEY: &str = "talaria.args";

/// Where an argument value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    /// A route parameter bound by the pattern.
    Path,
    /// A request header.
    Header,
    /// A form value (query string or urlencoded body).
    Body,
}

/// One declared action argument.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    name: String,
    source: ParamSource,
    required: bool,
    default: Option<String>,
}

impl ParamSpec {
    fn new(name: impl Into<String>, source: ParamSource) -> Self {
        Self {
            name: name.into(),
            source,
            required: false,
            default: None,
        }
    }

    /// An argument read from a route parameter.
    pub fn path(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Path)
    }

    /// An argument read from a request header.
    pub fn header(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Header)
    }

    /// An argument read from a form value.
    pub fn body(name: impl Into<String>) -> Self {
        Self::new(name, ParamSource::Body)
    }

    /// Marks the argument required; a missing value aborts with 400.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Fallback value when the source has nothing.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// The argument name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Arguments bound for the current action.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BoundArgs {
    values: IndexMap<String, String>,
}

impl BoundArgs {
    /// Reads the arguments stowed on the context, empty if none were bound.
    #[must_use]
    pub fn from_context(ctx: &Context) -> Self {
        let mut values = IndexMap::new();
        if let Some(serde_json::Value::Object(map)) = ctx.input.data(ARGS_DATA_KEY) {
            for (k, v) in map {
                if let serde_json::Value::String(s) = v {
                    values.insert(k.clone(), s.clone());
                }
            }
        }
        Self { values }
    }

    /// A raw argument value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// An argument parsed as an integer.
    #[must_use]
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name)?.parse().ok()
    }

    /// An argument parsed as a float.
    #[must_use]
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name)?.parse().ok()
    }

    /// An argument parsed as a bool.
    #[must_use]
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name)?.parse().ok()
    }

    /// Number of bound arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing was bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Resolves `specs` against the context and stows the result for the action.
/// A required argument with no value aborts with 400.
pub(crate) fn bind_args(specs: &[ParamSpec], ctx: &mut Context) -> Result<(), Interrupt> {
    let mut values = serde_json::Map::new();
    for spec in specs {
        let found = match spec.source {
            ParamSource::Path => ctx.input.param(&spec.name).map(str::to_string),
            ParamSource::Header => ctx.request.header(&spec.name).map(str::to_string),
            ParamSource::Body => ctx.input.query(&spec.name).map(str::to_string),
        };
        match found.or_else(|| spec.default.clone()) {
            Some(value) => {
                values.insert(spec.name.clone(), serde_json::Value::String(value));
            }
            None if spec.required => return Err(Interrupt::Abort { status: 400 }),
            None => {}
        }
    }
    ctx.input
        .set_data(ARGS_DATA_KEY, serde_json::Value::Object(values));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use talaria_core::Request;

    fn ctx(path_and_query: &str) -> Context {
        let mut ctx = Context::new(Request::new(Method::GET, path_and_query.parse().unwrap()));
        let query = ctx.request.query().map(str::to_string);
        ctx.input.parse_form(query.as_deref(), None);
        ctx
    }

    #[test]
    fn test_bind_from_all_sources() {
        let mut c = ctx("/user/7?page=2");
        c.input.set_param("id", "7");
        c.request
            .headers
            .insert("x-tenant", "acme".parse().unwrap());

        let specs = vec![
            ParamSpec::path("id").required(),
            ParamSpec::header("x-tenant"),
            ParamSpec::body("page").default_value("1"),
        ];
        bind_args(&specs, &mut c).unwrap();

        let args = BoundArgs::from_context(&c);
        assert_eq!(args.get("id"), Some("7"));
        assert_eq!(args.get_i64("id"), Some(7));
        assert_eq!(args.get("x-tenant"), Some("acme"));
        assert_eq!(args.get_i64("page"), Some(2));
    }

    #[test]
    fn test_default_applies_when_source_empty() {
        let mut c = ctx("/user");
        let specs = vec![ParamSpec::body("page").default_value("1")];
        bind_args(&specs, &mut c).unwrap();
        assert_eq!(BoundArgs::from_context(&c).get("page"), Some("1"));
    }

    #[test]
    fn test_missing_required_aborts_400() {
        let mut c = ctx("/user");
        let specs = vec![ParamSpec::path("id").required()];
        assert_eq!(
            bind_args(&specs, &mut c).unwrap_err(),
            Interrupt::Abort { status: 400 }
        );
    }

    #[test]
    fn test_missing_optional_is_absent() {
        let mut c = ctx("/user");
        let specs = vec![ParamSpec::body("page")];
        bind_args(&specs, &mut c).unwrap();
        let args = BoundArgs::from_context(&c);
        assert!(args.is_empty());
        assert_eq!(args.get("page"), None);
    }
}
