//! Typed registry of template filters and shortcodes
//!
//! Every callable is registered with a declared signature: the kind of value a
//! filter accepts plus its named arguments. Names and signatures are validated
//! when they are registered, and arguments are checked against the signature
//! before the function runs. `install` wires the registry into Tera:
//!
//! - filters become Tera filters (`{{ post.content | word_count }}`)
//! - single shortcodes become Tera functions (`{{ icon(name="moon") }}`)
//! - paired shortcodes become Tera filters applied to a block
//!   (`{% filter aside %}...{% endfilter %}`)

mod filters;
mod shortcodes;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tera::Tera;
use thiserror::Error;

use crate::config::SiteConfig;

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid name regex");
}

/// Names Tera already defines; registering over them would silently replace a built-in
const RESERVED: &[&str] = &[
    "lower", "upper", "wordcount", "capitalize", "replace", "addslashes", "slugify", "title",
    "trim", "trim_start", "trim_end", "trim_start_matches", "trim_end_matches", "truncate",
    "linebreaksbr", "spaceless", "indent", "striptags", "escape", "escape_xml", "split", "int",
    "float", "json_encode", "as_str", "length", "reverse", "first", "last", "nth", "join", "sort",
    "unique", "slice", "group_by", "filter", "map", "concat", "urlencode", "urlencode_strict",
    "abs", "pluralize", "round", "filesizeformat", "date", "get", "safe", "default", "range",
    "now", "throw", "get_random", "get_env",
];

/// Errors from registration or from calling a registered function
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("invalid name {0:?}: use lowercase letters, digits and underscores")]
    InvalidName(String),

    #[error("{0:?} is already registered")]
    Duplicate(String),

    #[error("{0:?} is a built-in template function")]
    Reserved(String),

    #[error("{callable}: argument {arg:?} is declared twice")]
    DuplicateArg { callable: String, arg: String },

    #[error("{callable}: required argument {arg:?} follows an optional one")]
    RequiredAfterOptional { callable: String, arg: String },

    #[error("{callable}: missing required argument {arg:?}")]
    MissingArg { callable: String, arg: String },

    #[error("{callable}: unknown argument {arg:?}")]
    UnknownArg { callable: String, arg: String },

    #[error("{callable}: {arg} must be {expected}, found {found}")]
    WrongType {
        callable: String,
        arg: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{callable}: {message}")]
    Failed { callable: String, message: String },
}

impl RegistryError {
    pub(crate) fn failed(callable: &str, message: impl Into<String>) -> Self {
        RegistryError::Failed {
            callable: callable.to_string(),
            message: message.into(),
        }
    }
}

/// Kind of value a filter input or argument accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Any,
    String,
    Number,
    Bool,
    Array,
    Object,
}

impl ValueKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            ValueKind::Any => true,
            ValueKind::String => value.is_string(),
            ValueKind::Number => value.is_number(),
            ValueKind::Bool => value.is_boolean(),
            ValueKind::Array => value.is_array(),
            ValueKind::Object => value.is_object(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ValueKind::Any => "any value",
            ValueKind::String => "a string",
            ValueKind::Number => "a number",
            ValueKind::Bool => "a boolean",
            ValueKind::Array => "an array",
            ValueKind::Object => "an object",
        }
    }

    fn of(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Number(_) => "a number",
            Value::String(_) => "a string",
            Value::Array(_) => "an array",
            Value::Object(_) => "an object",
        }
    }
}

/// A declared named argument
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ValueKind,
    pub required: bool,
}

impl ArgSpec {
    pub const fn required(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Arguments of one call, already checked against the signature
pub struct Args<'a> {
    values: &'a HashMap<String, Value>,
}

impl<'a> Args<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }
}

pub type FilterFn = fn(&Value, &Args<'_>, &SiteConfig) -> Result<Value, RegistryError>;

/// A filter and its signature
#[derive(Clone, Copy)]
pub struct FilterDef {
    pub name: &'static str,
    pub input: ValueKind,
    pub args: &'static [ArgSpec],
    pub func: FilterFn,
}

impl FilterDef {
    /// Check `value` and `args` against the signature, then run the filter
    pub fn call(
        &self,
        value: &Value,
        args: &HashMap<String, Value>,
        config: &SiteConfig,
    ) -> Result<Value, RegistryError> {
        if !self.input.matches(value) {
            return Err(RegistryError::WrongType {
                callable: self.name.to_string(),
                arg: "input".to_string(),
                expected: self.input.describe(),
                found: ValueKind::of(value),
            });
        }
        check_args(self.name, self.args, args)?;
        (self.func)(value, &Args { values: args }, config)
    }
}

/// Whether a shortcode wraps a body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcodeKind {
    Single,
    Paired,
}

/// One shortcode invocation
pub struct ShortcodeCall<'a> {
    /// Wrapped content, present only for paired shortcodes
    pub body: Option<&'a str>,
    pub args: Args<'a>,
}

pub type ShortcodeFn = fn(&ShortcodeCall<'_>, &SiteConfig) -> Result<String, RegistryError>;

/// A shortcode and its signature
#[derive(Clone, Copy)]
pub struct ShortcodeDef {
    pub name: &'static str,
    pub kind: ShortcodeKind,
    pub args: &'static [ArgSpec],
    pub func: ShortcodeFn,
}

impl ShortcodeDef {
    /// Check `args` against the signature, then expand the shortcode
    pub fn call(
        &self,
        body: Option<&str>,
        args: &HashMap<String, Value>,
        config: &SiteConfig,
    ) -> Result<String, RegistryError> {
        check_args(self.name, self.args, args)?;
        let call = ShortcodeCall {
            body,
            args: Args { values: args },
        };
        (self.func)(&call, config)
    }
}

fn check_args(
    callable: &str,
    specs: &[ArgSpec],
    args: &HashMap<String, Value>,
) -> Result<(), RegistryError> {
    for name in args.keys() {
        if !specs.iter().any(|spec| spec.name == name) {
            return Err(RegistryError::UnknownArg {
                callable: callable.to_string(),
                arg: name.clone(),
            });
        }
    }

    for spec in specs {
        match args.get(spec.name) {
            None if spec.required => {
                return Err(RegistryError::MissingArg {
                    callable: callable.to_string(),
                    arg: spec.name.to_string(),
                });
            }
            Some(value) if !spec.kind.matches(value) => {
                return Err(RegistryError::WrongType {
                    callable: callable.to_string(),
                    arg: spec.name.to_string(),
                    expected: spec.kind.describe(),
                    found: ValueKind::of(value),
                });
            }
            _ => {}
        }
    }

    Ok(())
}

/// Name -> filter / shortcode, validated at registration time
#[derive(Default, Clone)]
pub struct Registry {
    filters: IndexMap<&'static str, FilterDef>,
    shortcodes: IndexMap<&'static str, ShortcodeDef>,
}

impl Registry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in filters and shortcodes
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for def in filters::builtin() {
            registry.register_filter(def)?;
        }
        for def in shortcodes::builtin() {
            registry.register_shortcode(def)?;
        }
        Ok(registry)
    }

    pub fn register_filter(&mut self, def: FilterDef) -> Result<(), RegistryError> {
        self.validate(def.name, def.args)?;
        self.filters.insert(def.name, def);
        Ok(())
    }

    pub fn register_shortcode(&mut self, def: ShortcodeDef) -> Result<(), RegistryError> {
        self.validate(def.name, def.args)?;
        self.shortcodes.insert(def.name, def);
        Ok(())
    }

    pub fn filter(&self, name: &str) -> Option<&FilterDef> {
        self.filters.get(name)
    }

    pub fn shortcode(&self, name: &str) -> Option<&ShortcodeDef> {
        self.shortcodes.get(name)
    }

    /// Registered filter names, in registration order
    pub fn filter_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.filters.keys().copied()
    }

    /// Registered shortcode names, in registration order
    pub fn shortcode_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.shortcodes.keys().copied()
    }

    fn validate(&self, name: &'static str, args: &[ArgSpec]) -> Result<(), RegistryError> {
        if !NAME_RE.is_match(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if RESERVED.contains(&name) {
            return Err(RegistryError::Reserved(name.to_string()));
        }
        // Filters and shortcodes share one namespace once installed
        if self.filters.contains_key(name) || self.shortcodes.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        let mut seen_optional = false;
        for (i, spec) in args.iter().enumerate() {
            if args[..i].iter().any(|other| other.name == spec.name) {
                return Err(RegistryError::DuplicateArg {
                    callable: name.to_string(),
                    arg: spec.name.to_string(),
                });
            }
            if spec.required && seen_optional {
                return Err(RegistryError::RequiredAfterOptional {
                    callable: name.to_string(),
                    arg: spec.name.to_string(),
                });
            }
            seen_optional |= !spec.required;
        }

        Ok(())
    }

    /// Register every filter and shortcode on a Tera instance
    pub fn install(&self, tera: &mut Tera, config: Arc<SiteConfig>) {
        for def in self.filters.values().copied() {
            let config = Arc::clone(&config);
            tera.register_filter(
                def.name,
                move |value: &Value, args: &HashMap<String, Value>| {
                    def.call(value, args, &config)
                        .map_err(|e| tera::Error::msg(e.to_string()))
                },
            );
        }

        for def in self.shortcodes.values().copied() {
            let config = Arc::clone(&config);
            match def.kind {
                ShortcodeKind::Single => tera.register_function(
                    def.name,
                    move |args: &HashMap<String, Value>| {
                        def.call(None, args, &config)
                            .map(Value::String)
                            .map_err(|e| tera::Error::msg(e.to_string()))
                    },
                ),
                ShortcodeKind::Paired => tera.register_filter(
                    def.name,
                    move |body: &Value, args: &HashMap<String, Value>| {
                        let body = body.as_str().ok_or_else(|| {
                            tera::Error::msg(format!("{}: body must be text", def.name))
                        })?;
                        def.call(Some(body), args, &config)
                            .map(Value::String)
                            .map_err(|e| tera::Error::msg(e.to_string()))
                    },
                ),
            }
        }

        tracing::debug!(
            "Installed {} filters and {} shortcodes",
            self.filters.len(),
            self.shortcodes.len()
        );
    }
}
