use std::collections::HashMap;

/// Translation lookup used for library-provided strings such as the default
/// subject and the fallback message.
pub trait Translator: Send + Sync {
    fn translate(&self, key: &str) -> String;
}

/// Returns every key unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, key: &str) -> String {
        key.to_string()
    }
}

/// In-memory catalogue; unknown keys fall back to the key itself.
#[derive(Debug, Clone, Default)]
pub struct CatalogTranslator {
    entries: HashMap<String, String>,
}

impl CatalogTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }
}

impl Translator for CatalogTranslator {
    fn translate(&self, key: &str) -> String {
        self.entries
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_returns_key() {
        assert_eq!(IdentityTranslator.translate("No Subject"), "No Subject");
    }

    #[test]
    fn catalog_falls_back_to_key() {
        let translator = CatalogTranslator::new().with_entry("No Subject", "Kein Betreff");
        assert_eq!(translator.translate("No Subject"), "Kein Betreff");
        assert_eq!(translator.translate("Other"), "Other");
    }
}
