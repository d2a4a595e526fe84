//! Type-aware JSON trimming: strips bulky or irrelevant schema.org fields
//! from an item's JSON before it goes into a ranking/description/context
//! prompt. Grounded in `utils/trim.py`'s per-type skip-attribute lists.

use serde_json::Value;

const RECIPE_SKIP: &[&str] = &["mainEntityOfPage", "publisher", "image", "datePublished", "dateModified", "author"];

const MOVIE_SKIP: &[&str] = &[
    "mainEntityOfPage",
    "publisher",
    "image",
    "datePublished",
    "dateModified",
    "author",
    "trailer",
];

const MOVIE_NAME_ONLY: &[&str] = &["actor", "director", "creator"];

/// Trims `schema_json` by its schema.org `@type`. `Recipe` drops a fixed set
/// of bulky fields; `Movie`/`TVSeries` does the same plus collapses
/// `actor`/`director`/`creator` down to just their names. Any other type
/// (including a missing `@type`, which defaults to `Thing`) passes through
/// untouched. Falls back to the input unchanged on unparseable JSON, so
/// callers never need to handle trimming failure separately from "nothing
/// to trim".
#[must_use]
pub fn trim_json(schema_json: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(schema_json) else {
        return schema_json.to_string();
    };
    let trimmed = trim_value(value);
    serde_json::to_string(&trimmed).unwrap_or_else(|_| schema_json.to_string())
}

fn item_types(value: &Value) -> Vec<String> {
    match value.get("@type") {
        Some(Value::String(t)) => vec![t.clone()],
        Some(Value::Array(types)) => types.iter().filter_map(|t| t.as_str().map(str::to_string)).collect(),
        _ => vec!["Thing".to_string()],
    }
}

fn trim_value(value: Value) -> Value {
    let Value::Object(ref map) = value else {
        return value;
    };
    let types = item_types(&value);
    if types.iter().any(|t| t == "Recipe") {
        return drop_fields(map, RECIPE_SKIP, &[]);
    }
    if types.iter().any(|t| t == "Movie" || t == "TVSeries") {
        return drop_fields(map, MOVIE_SKIP, MOVIE_NAME_ONLY);
    }
    value
}

fn drop_fields(map: &serde_json::Map<String, Value>, skip: &[&str], name_only: &[&str]) -> Value {
    let mut out = serde_json::Map::new();
    for (attr, val) in map {
        if skip.contains(&attr.as_str()) {
            continue;
        }
        if name_only.contains(&attr.as_str()) {
            out.insert(attr.clone(), names_of(val));
            continue;
        }
        out.insert(attr.clone(), val.clone());
    }
    Value::Object(out)
}

/// Collapses a cast/crew value (a single person/org object, or a list of
/// them) down to just the `name` field of each entry.
fn names_of(value: &Value) -> Value {
    let entries: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let names: Vec<Value> = entries.into_iter().filter_map(|entry| entry.get("name").cloned()).collect();
    Value::Array(names)
}
