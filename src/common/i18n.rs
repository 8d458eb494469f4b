// src/common/i18n.rs

use std::{collections::HashMap, sync::Arc};

// Idioma usado quando o pedido não informa um que conhecemos
pub const DEFAULT_LANG: &str = "pt";

// Os pacotes de mensagens vão embutidos no binário
const BUNDLES: &[(&str, &str)] = &[
    ("pt", include_str!("../../locales/pt.json")),
    ("en", include_str!("../../locales/en.json")),
];

#[derive(Clone, Debug)]
pub struct I18nStore {
    bundles: Arc<HashMap<String, HashMap<String, String>>>,
}

impl I18nStore {
    pub fn load() -> anyhow::Result<Self> {
        let mut bundles = HashMap::new();
        for (lang, raw) in BUNDLES {
            let messages: HashMap<String, String> = serde_json::from_str(raw)
                .map_err(|e| anyhow::anyhow!("Pacote de idioma '{}' inválido: {}", lang, e))?;
            bundles.insert(lang.to_string(), messages);
        }
        Ok(Self { bundles: Arc::new(bundles) })
    }

    /// Procura a chave no idioma pedido, depois no padrão; sem tradução, devolve a própria chave.
    pub fn translate(&self, lang: &str, key: &str) -> String {
        self.bundles
            .get(lang)
            .and_then(|messages| messages.get(key))
            .or_else(|| self.bundles.get(DEFAULT_LANG).and_then(|m| m.get(key)))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundles_have_the_same_keys() {
        let store = I18nStore::load().unwrap();
        let pt = &store.bundles["pt"];
        let en = &store.bundles["en"];
        let mut faltando: Vec<_> = pt.keys().filter(|k| !en.contains_key(*k)).collect();
        faltando.extend(en.keys().filter(|k| !pt.contains_key(*k)));
        assert!(faltando.is_empty(), "chaves sem tradução: {:?}", faltando);
    }

    #[test]
    fn falls_back_to_default_language_then_key() {
        let store = I18nStore::load().unwrap();
        assert_eq!(store.translate("en", "errors.obra_not_found"), "Project not found.");
        assert_eq!(store.translate("de", "errors.obra_not_found"), "Obra não encontrada.");
        assert_eq!(store.translate("pt", "errors.nao_existe"), "errors.nao_existe");
    }
}
