//! Prompt resolution and template filling.
//!
//! Templates are looked up by `(site, item_type, prompt_name)` with a
//! documented fallback chain, the Rust equivalent of the reference
//! implementation's `find_prompt`/`PromptRunner.get_prompt`.

pub mod builtin;

use std::collections::HashMap;

/// A prompt template registry with site/item-type overrides layered over
/// compiled-in defaults.
#[derive(Debug, Clone, Default)]
pub struct PromptStore {
    /// Keyed by `(site, item_type, prompt_name)`.
    overrides: HashMap<(String, String, String), String>,
}

impl PromptStore {
    /// An empty store — every lookup falls through to compiled-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom template for an exact `(site, item_type, name)` key.
    pub fn set_override(&mut self, site: &str, item_type: &str, name: &str, template: String) {
        self.overrides
            .insert((site.to_string(), item_type.to_string(), name.to_string()), template);
    }

    /// Resolves a prompt template, trying (in order):
    /// 1. an exact `(site, item_type, name)` override,
    /// 2. a `(site, "Thing", name)` override,
    /// 3. the compiled-in default for `name`.
    ///
    /// Returns `None` only if `name` has no compiled-in default either
    /// (mirrors `find_prompt` returning `None`, which the reference
    /// `PromptRunner` treats as "skip this step, no LLM call").
    #[must_use]
    pub fn resolve(&self, site: &str, item_type: &str, name: &str) -> Option<&str> {
        if let Some(t) = self
            .overrides
            .get(&(site.to_string(), item_type.to_string(), name.to_string()))
        {
            return Some(t.as_str());
        }
        if item_type != "Thing"
            && let Some(t) = self
                .overrides
                .get(&(site.to_string(), "Thing".to_string(), name.to_string()))
        {
            return Some(t.as_str());
        }
        builtin::default_template(name)
    }
}

/// Fills `{key}`-style placeholders in `template` from `vars`.
#[must_use]
pub fn fill_template(template: &str, vars: &HashMap<&str, &str>) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{'
            && let Some(end) = template[i..].find('}')
        {
            let key = &template[i + 1..i + end];
            if let Some(value) = vars.get(key) {
                out.push_str(value);
                i += end + 1;
                continue;
            }
        }
        // Advance by one char (not necessarily one byte) to stay UTF-8 safe.
        let ch = template[i..].chars().next().unwrap_or('\0');
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_falls_back_to_default() {
        let store = PromptStore::new();
        assert!(store.resolve("imdb", "Movie", "RankingPrompt").is_some());
    }

    #[test]
    fn resolve_unknown_name_returns_none() {
        let store = PromptStore::new();
        assert!(store.resolve("imdb", "Movie", "NoSuchPrompt").is_none());
    }

    #[test]
    fn resolve_prefers_exact_override() {
        let mut store = PromptStore::new();
        store.set_override("imdb", "Movie", "RankingPrompt", "custom movie prompt".to_string());
        assert_eq!(store.resolve("imdb", "Movie", "RankingPrompt"), Some("custom movie prompt"));
    }

    #[test]
    fn resolve_falls_back_to_thing_override() {
        let mut store = PromptStore::new();
        store.set_override("imdb", "Thing", "RankingPrompt", "generic override".to_string());
        assert_eq!(store.resolve("imdb", "Movie", "RankingPrompt"), Some("generic override"));
    }

    #[test]
    fn fill_template_substitutes_known_keys() {
        let mut vars = HashMap::new();
        vars.insert("request.query", "best running shoes");
        let out = fill_template("Question: {request.query}?", &vars);
        assert_eq!(out, "Question: best running shoes?");
    }

    #[test]
    fn fill_template_leaves_unknown_placeholders() {
        let vars = HashMap::new();
        let out = fill_template("Hello {missing}", &vars);
        assert_eq!(out, "Hello {missing}");
    }
}
