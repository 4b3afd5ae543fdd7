// src/common/i18n.rs

use std::{collections::HashMap, sync::OnceLock};

pub const DEFAULT_LANGUAGE: &str = "en";

// Message catalogs compiled into the binary. One flat JSON object per language.
const CATALOGS: &[(&str, &str)] = &[
    ("en", include_str!("../../locales/en.json")),
    ("es", include_str!("../../locales/es.json")),
];

#[derive(Debug, Clone, Default)]
pub struct I18nStore {
    messages: HashMap<String, HashMap<String, String>>,
}

impl I18nStore {
    pub fn load() -> anyhow::Result<Self> {
        let mut messages = HashMap::new();
        for (lang, raw) in CATALOGS {
            let catalog: HashMap<String, String> = serde_json::from_str(raw)
                .map_err(|e| anyhow::anyhow!("invalid message catalog '{}': {}", lang, e))?;
            messages.insert(lang.to_string(), catalog);
        }
        Ok(Self { messages })
    }

    /// Shared instance for places without access to `AppState`.
    pub fn global() -> &'static I18nStore {
        static STORE: OnceLock<I18nStore> = OnceLock::new();
        STORE.get_or_init(|| Self::load().unwrap_or_default())
    }

    pub fn supports(&self, lang: &str) -> bool {
        self.messages.contains_key(lang)
    }

    /// Looks the key up in `lang`, then in English, then falls back to the key itself.
    /// `{name}` placeholders are replaced from `params`.
    pub fn translate(&self, lang: &str, key: &str, params: &[(&str, String)]) -> String {
        let template = self
            .messages
            .get(lang)
            .and_then(|catalog| catalog.get(key))
            .or_else(|| {
                self.messages
                    .get(DEFAULT_LANGUAGE)
                    .and_then(|catalog| catalog.get(key))
            })
            .cloned()
            .unwrap_or_else(|| key.to_string());

        params.iter().fold(template, |acc, (name, value)| {
            acc.replace(&format!("{{{}}}", name), value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogs_parse() {
        let store = I18nStore::load().unwrap();
        assert!(store.supports("en"));
        assert!(store.supports("es"));
    }

    #[test]
    fn falls_back_to_english_then_key() {
        let store = I18nStore::load().unwrap();
        let en = store.translate("en", "EMPTY_CART", &[]);
        assert_eq!(store.translate("de", "EMPTY_CART", &[]), en);
        assert_eq!(store.translate("en", "NO_SUCH_KEY", &[]), "NO_SUCH_KEY");
    }

    #[test]
    fn substitutes_placeholders() {
        let store = I18nStore::load().unwrap();
        let msg = store.translate(
            "en",
            "INSUFFICIENT_STOCK",
            &[("sku", "TSHIRT-M".to_string()), ("available", "2".to_string())],
        );
        assert!(msg.contains("TSHIRT-M"));
        assert!(msg.contains('2'));
        assert!(!msg.contains('{'));
    }

    #[test]
    fn every_english_key_exists_in_spanish() {
        let store = I18nStore::load().unwrap();
        let en = &store.messages["en"];
        let es = &store.messages["es"];
        let missing: Vec<_> = en.keys().filter(|k| !es.contains_key(*k)).collect();
        assert!(missing.is_empty(), "missing es keys: {:?}", missing);
    }
}
