use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

pub(crate) const DEFAULT_STORAGE_KEY: &str = "recallify_local_db";

/// Timing and storage policy. Defaults suit the desktop app; `window.ENV` may override them.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EditorConfig {
    pub autosave_ms: u32,
    pub search_debounce_ms: u32,
    pub hover_grace_ms: u32,
    pub hover_tolerance_px: f64,
    pub search_limit: usize,
    pub storage_key: String,

    /// Commit a pending autosave when the editor closes instead of dropping it.
    pub flush_on_close: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            autosave_ms: 500,
            search_debounce_ms: 200,
            hover_grace_ms: 150,
            hover_tolerance_px: 2.0,
            search_limit: 20,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            flush_on_close: false,
        }
    }
}

fn parse_into<T: FromStr>(target: &mut T, key: &str, raw: Option<String>) {
    let Some(raw) = raw else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => *target = v,
        Err(_) => warn!(key, value = %raw, "ignoring invalid config override"),
    }
}

impl EditorConfig {
    /// Apply overrides from `lookup`, which is asked for each upper-case key
    /// (`AUTOSAVE_MS`, `STORAGE_KEY`, ...). Unparseable values keep the current setting.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        parse_into(&mut self.autosave_ms, "AUTOSAVE_MS", lookup("AUTOSAVE_MS"));
        parse_into(
            &mut self.search_debounce_ms,
            "SEARCH_DEBOUNCE_MS",
            lookup("SEARCH_DEBOUNCE_MS"),
        );
        parse_into(&mut self.hover_grace_ms, "HOVER_GRACE_MS", lookup("HOVER_GRACE_MS"));
        parse_into(
            &mut self.hover_tolerance_px,
            "HOVER_TOLERANCE_PX",
            lookup("HOVER_TOLERANCE_PX"),
        );
        parse_into(&mut self.search_limit, "SEARCH_LIMIT", lookup("SEARCH_LIMIT"));
        parse_into(&mut self.flush_on_close, "FLUSH_ON_CLOSE", lookup("FLUSH_ON_CLOSE"));

        match lookup("STORAGE_KEY").map(|k| k.trim().to_string()) {
            Some(key) if !key.is_empty() => self.storage_key = key,
            Some(_) => warn!("ignoring empty STORAGE_KEY override"),
            None => {}
        }
        self
    }

    /// Defaults overridden by `window.ENV`. Both `AUTOSAVE_MS` and `autosave_ms` spellings work.
    pub fn from_window() -> Self {
        let env = web_sys::window()
            .and_then(|w| w.get("ENV"))
            .filter(|env| !env.is_undefined() && env.is_object());

        let Some(env) = env else {
            return Self::default();
        };

        Self::default().with_overrides(|key| {
            [key.to_string(), key.to_ascii_lowercase()]
                .iter()
                .filter_map(|k| js_sys::Reflect::get(&env, &k.as_str().into()).ok())
                .find(|v| !v.is_undefined() && !v.is_null())
                .and_then(|v| {
                    v.as_string()
                        .or_else(|| v.as_f64().map(|n| n.to_string()))
                        .or_else(|| v.as_bool().map(|b| b.to_string()))
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tracing_test::traced_test;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults_match_policy_constants() {
        let c = EditorConfig::default();
        assert_eq!(c.autosave_ms, 500);
        assert_eq!(c.search_debounce_ms, 200);
        assert_eq!(c.hover_grace_ms, 150);
        assert_eq!(c.search_limit, 20);
        assert_eq!(c.storage_key, "recallify_local_db");
        assert!(!c.flush_on_close);
    }

    #[test]
    fn test_overrides_apply_parsed_values() {
        let c = EditorConfig::default().with_overrides(lookup(&[
            ("AUTOSAVE_MS", "800"),
            ("HOVER_TOLERANCE_PX", "4.5"),
            ("FLUSH_ON_CLOSE", "true"),
            ("STORAGE_KEY", " alt_db "),
        ]));
        assert_eq!(c.autosave_ms, 800);
        assert_eq!(c.hover_tolerance_px, 4.5);
        assert!(c.flush_on_close);
        assert_eq!(c.storage_key, "alt_db");
        assert_eq!(c.search_debounce_ms, 200);
    }

    #[test]
    #[traced_test]
    fn test_invalid_override_keeps_default_and_warns() {
        let c = EditorConfig::default()
            .with_overrides(lookup(&[("SEARCH_LIMIT", "lots"), ("STORAGE_KEY", "  ")]));
        assert_eq!(c.search_limit, 20);
        assert_eq!(c.storage_key, "recallify_local_db");
        assert!(logs_contain("ignoring invalid config override"));
        assert!(logs_contain("ignoring empty STORAGE_KEY override"));
    }
}
