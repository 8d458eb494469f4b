// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};

use crate::common::i18n::DEFAULT_LANG;

// Nosso extrator de idioma
pub struct Locale(pub String);

impl Locale {
    /// "pt-BR, en;q=0.8" -> "pt". Sem cabeçalho (ou ilegível), o idioma padrão.
    pub fn from_header(header_str: Option<&str>) -> Self {
        let lang = header_str
            .and_then(|header_str| {
                accept_language::parse(header_str)
                    .first() // Pega o idioma de maior peso (ex: "pt-BR")
                    .map(|tag_string| {
                        // "pt-BR" -> split vira ["pt", "BR"] -> next() pega "pt"
                        tag_string
                            .split('-')
                            .next()
                            .unwrap_or(tag_string)
                            .to_lowercase()
                    })
            })
            .filter(|lang| !lang.is_empty())
            .unwrap_or_else(|| DEFAULT_LANG.to_string());

        Locale(lang)
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header_str = headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|header_value| header_value.to_str().ok());

        Locale::from_header(header_str)
    }
}

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Locale::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_primary_subtag_of_preferred_language() {
        assert_eq!(Locale::from_header(Some("pt-BR,en;q=0.8")).0, "pt");
        assert_eq!(Locale::from_header(Some("en;q=0.5, pt-BR;q=0.9")).0, "pt");
        assert_eq!(Locale::from_header(Some("EN-us")).0, "en");
    }

    #[test]
    fn defaults_to_portuguese() {
        assert_eq!(Locale::from_header(None).0, "pt");
        assert_eq!(Locale::from_header(Some("")).0, "pt");
    }
}
