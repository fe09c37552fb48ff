//! Built-in filters

use serde_json::Value;
use std::cmp::Ordering;

use super::{ArgSpec, Args, FilterDef, RegistryError, ValueKind};
use crate::config::SiteConfig;
use crate::content::frontmatter::parse_date_string;
use crate::helpers;

const FORMAT_DATE_ARGS: &[ArgSpec] = &[ArgSpec::optional("format", ValueKind::String)];
const DIVIDED_BY_ARGS: &[ArgSpec] = &[ArgSpec::required("divisor", ValueKind::Number)];
const LIMIT_ARGS: &[ArgSpec] = &[ArgSpec::required("n", ValueKind::Number)];
const WHERE_EQ_ARGS: &[ArgSpec] = &[
    ArgSpec::required("key", ValueKind::String),
    ArgSpec::required("value", ValueKind::Any),
];
const SORT_BY_KEY_ARGS: &[ArgSpec] = &[
    ArgSpec::required("key", ValueKind::String),
    ArgSpec::optional("reverse", ValueKind::Bool),
];
const LATEST_DATE_ARGS: &[ArgSpec] = &[ArgSpec::optional("key", ValueKind::String)];

pub(super) fn builtin() -> Vec<FilterDef> {
    vec![
        FilterDef {
            name: "word_count",
            input: ValueKind::String,
            args: &[],
            func: word_count,
        },
        FilterDef {
            name: "strip_html",
            input: ValueKind::String,
            args: &[],
            func: |v, _, _| Ok(Value::String(helpers::strip_html(text(v)))),
        },
        FilterDef {
            name: "strip_newlines",
            input: ValueKind::String,
            args: &[],
            func: |v, _, _| Ok(Value::String(helpers::strip_newlines(text(v)))),
        },
        FilterDef {
            name: "newline_to_br",
            input: ValueKind::String,
            args: &[],
            func: |v, _, _| Ok(Value::String(helpers::newline_to_br(text(v)))),
        },
        FilterDef {
            name: "to_iso_string",
            input: ValueKind::String,
            args: &[],
            func: to_iso_string,
        },
        FilterDef {
            name: "format_date",
            input: ValueKind::String,
            args: FORMAT_DATE_ARGS,
            func: format_date,
        },
        FilterDef {
            name: "to_absolute_url",
            input: ValueKind::String,
            args: &[],
            func: |v, _, config| Ok(Value::String(helpers::absolute_url(config, text(v)))),
        },
        FilterDef {
            name: "divided_by",
            input: ValueKind::Number,
            args: DIVIDED_BY_ARGS,
            func: divided_by,
        },
        FilterDef {
            name: "limit",
            input: ValueKind::Array,
            args: LIMIT_ARGS,
            func: limit,
        },
        FilterDef {
            name: "where_eq",
            input: ValueKind::Array,
            args: WHERE_EQ_ARGS,
            func: where_eq,
        },
        FilterDef {
            name: "sort_by_key",
            input: ValueKind::Array,
            args: SORT_BY_KEY_ARGS,
            func: sort_by_key,
        },
        FilterDef {
            name: "latest_date",
            input: ValueKind::Array,
            args: LATEST_DATE_ARGS,
            func: latest_date,
        },
        FilterDef {
            name: "json_parse",
            input: ValueKind::String,
            args: &[],
            func: |v, _, _| {
                serde_json::from_str(text(v))
                    .map_err(|e| RegistryError::failed("json_parse", e.to_string()))
            },
        },
    ]
}

/// Input already checked as a string
fn text(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

fn word_count(value: &Value, _args: &Args<'_>, _config: &SiteConfig) -> Result<Value, RegistryError> {
    Ok(Value::from(helpers::count_words(text(value))))
}

fn to_iso_string(value: &Value, _args: &Args<'_>, config: &SiteConfig) -> Result<Value, RegistryError> {
    let zone = config
        .zone()
        .map_err(|e| RegistryError::failed("to_iso_string", e.to_string()))?;
    let date = parse_date_string(text(value), &zone)
        .ok_or_else(|| RegistryError::failed("to_iso_string", format!("not a date: {:?}", text(value))))?;
    Ok(Value::String(helpers::date_xml(&date)))
}

fn format_date(value: &Value, args: &Args<'_>, config: &SiteConfig) -> Result<Value, RegistryError> {
    let zone = config
        .zone()
        .map_err(|e| RegistryError::failed("format_date", e.to_string()))?;
    let date = parse_date_string(text(value), &zone)
        .ok_or_else(|| RegistryError::failed("format_date", format!("not a date: {:?}", text(value))))?;
    let format = args.str("format").unwrap_or(&config.date_format);
    Ok(Value::String(helpers::format_date(&date, format)))
}

/// Integer division when both sides are integers, float division otherwise
fn divided_by(value: &Value, args: &Args<'_>, _config: &SiteConfig) -> Result<Value, RegistryError> {
    let divisor = args.get("divisor").unwrap_or(&Value::Null);

    if let (Some(a), Some(b)) = (value.as_i64(), divisor.as_i64()) {
        if b == 0 {
            return Err(RegistryError::failed("divided_by", "division by zero"));
        }
        return a
            .checked_div_euclid(b)
            .map(Value::from)
            .ok_or_else(|| RegistryError::failed("divided_by", "integer overflow"));
    }

    let (a, b) = (value.as_f64().unwrap_or(0.0), divisor.as_f64().unwrap_or(0.0));
    if b == 0.0 {
        return Err(RegistryError::failed("divided_by", "division by zero"));
    }
    Ok(Value::from(a / b))
}

fn limit(value: &Value, args: &Args<'_>, _config: &SiteConfig) -> Result<Value, RegistryError> {
    let n = args.f64("n").unwrap_or(0.0).max(0.0) as usize;
    let items = value.as_array().map(Vec::as_slice).unwrap_or(&[]);
    Ok(Value::Array(items.iter().take(n).cloned().collect()))
}

/// Look up a dotted key path like `data.category`
fn lookup<'v>(item: &'v Value, key: &str) -> Option<&'v Value> {
    key.split('.').try_fold(item, |current, part| current.get(part))
}

fn where_eq(value: &Value, args: &Args<'_>, _config: &SiteConfig) -> Result<Value, RegistryError> {
    let key = args.str("key").unwrap_or_default();
    let expected = args.get("value").unwrap_or(&Value::Null);
    let items = value.as_array().map(Vec::as_slice).unwrap_or(&[]);
    Ok(Value::Array(
        items
            .iter()
            .filter(|item| lookup(item, key) == Some(expected))
            .cloned()
            .collect(),
    ))
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        // Missing values sort last
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn sort_by_key(value: &Value, args: &Args<'_>, _config: &SiteConfig) -> Result<Value, RegistryError> {
    let key = args.str("key").unwrap_or_default();
    let reverse = args.bool("reverse").unwrap_or(false);
    let mut items = value.as_array().cloned().unwrap_or_default();
    items.sort_by(|a, b| {
        let ordering = compare_values(lookup(a, key), lookup(b, key));
        if reverse {
            ordering.reverse()
        } else {
            ordering
        }
    });
    Ok(Value::Array(items))
}

/// Newest date found under `key` (default `date_iso`) across the items, as ISO 8601
fn latest_date(value: &Value, args: &Args<'_>, config: &SiteConfig) -> Result<Value, RegistryError> {
    let key = args.str("key").unwrap_or("date_iso");
    let zone = config
        .zone()
        .map_err(|e| RegistryError::failed("latest_date", e.to_string()))?;

    let latest = value
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter_map(|item| lookup(item, key).and_then(Value::as_str))
        .filter_map(|s| parse_date_string(s, &zone))
        .max();

    Ok(latest
        .map(|date| Value::String(helpers::date_xml(&date)))
        .unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::super::Registry;
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn apply(name: &str, value: Value, args: &[(&str, Value)]) -> Result<Value, RegistryError> {
        let registry = Registry::with_defaults().unwrap();
        let config = SiteConfig {
            url: "https://example.com/".to_string(),
            timezone: "UTC".to_string(),
            ..Default::default()
        };
        let args: HashMap<String, Value> = args
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        registry.filter(name).unwrap().call(&value, &args, &config)
    }

    #[test]
    fn test_text_filters() {
        assert_eq!(apply("word_count", json!("<p>one two three</p>"), &[]), Ok(json!(3)));
        assert_eq!(apply("strip_html", json!("<b>bold</b>"), &[]), Ok(json!("bold")));
        assert_eq!(apply("newline_to_br", json!("a\nb"), &[]), Ok(json!("a<br>b")));
        assert_eq!(apply("strip_newlines", json!("a\nb"), &[]), Ok(json!("ab")));
    }

    #[test]
    fn test_date_filters() {
        assert_eq!(
            apply("to_iso_string", json!("2024-03-01"), &[]),
            Ok(json!("2024-03-01T00:00:00.000+00:00"))
        );
        assert_eq!(
            apply("format_date", json!("2024-03-01"), &[("format", json!("YYYY/MM/DD"))]),
            Ok(json!("2024/03/01"))
        );
        assert_eq!(
            apply("format_date", json!("2024-03-01"), &[]),
            Ok(json!("March 01, 2024"))
        );
        assert!(apply("to_iso_string", json!("soon"), &[]).is_err());
    }

    #[test]
    fn test_to_absolute_url() {
        assert_eq!(
            apply("to_absolute_url", json!("/blog/css/"), &[]),
            Ok(json!("https://example.com/blog/css/"))
        );
    }

    #[test]
    fn test_divided_by() {
        assert_eq!(apply("divided_by", json!(7), &[("divisor", json!(2))]), Ok(json!(3)));
        assert_eq!(apply("divided_by", json!(7.0), &[("divisor", json!(2))]), Ok(json!(3.5)));
        assert!(apply("divided_by", json!(7), &[("divisor", json!(0))]).is_err());
        assert!(apply("divided_by", json!(i64::MIN), &[("divisor", json!(-1))]).is_err());
    }

    #[test]
    fn test_array_filters() {
        let posts = json!([
            {"title": "a", "category": "css", "n": 2},
            {"title": "b", "category": "math", "n": 3},
            {"title": "c", "category": "css", "n": 1}
        ]);

        assert_eq!(
            apply("limit", posts.clone(), &[("n", json!(1))]).unwrap(),
            json!([{"title": "a", "category": "css", "n": 2}])
        );

        let css = apply(
            "where_eq",
            posts.clone(),
            &[("key", json!("category")), ("value", json!("css"))],
        )
        .unwrap();
        assert_eq!(css.as_array().unwrap().len(), 2);

        let sorted = apply("sort_by_key", posts.clone(), &[("key", json!("n"))]).unwrap();
        let titles: Vec<_> = sorted
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["c", "a", "b"]);

        let sorted = apply(
            "sort_by_key",
            posts,
            &[("key", json!("title")), ("reverse", json!(true))],
        )
        .unwrap();
        assert_eq!(sorted[0]["title"], "c");
    }

    #[test]
    fn test_latest_date() {
        let posts = json!([
            {"date_iso": "2023-05-01T00:00:00+00:00"},
            {"date_iso": "2024-01-02T00:00:00+00:00"},
            {"date_iso": "garbage"}
        ]);
        assert_eq!(
            apply("latest_date", posts, &[]),
            Ok(json!("2024-01-02T00:00:00.000+00:00"))
        );
        assert_eq!(apply("latest_date", json!([]), &[]), Ok(Value::Null));
    }

    #[test]
    fn test_json_parse() {
        assert_eq!(apply("json_parse", json!(r#"{"a": 1}"#), &[]), Ok(json!({"a": 1})));
        assert!(apply("json_parse", json!("{"), &[]).is_err());
    }
}
