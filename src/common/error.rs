use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::{common::i18n::I18nStore, middleware::i18n::Locale, models::catalog::ValidationWarning};

// Nosso tipo de erro de domínio, com `thiserror` para melhor ergonomia.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Acesso negado")]
    Forbidden,

    #[error("Papel não permitido no cadastro")]
    RoleNotAllowed,

    // --- Catálogo ---
    #[error("Grupo de insumo não encontrado: {0}")]
    GrupoNotFound(Uuid),

    #[error("Material não encontrado: {0}")]
    MaterialNotFound(Uuid),

    #[error("Cronologia já usada: {0}")]
    CronologiaAlreadyExists(i32),

    #[error("Reordenação inválida: a lista deve conter todas as fases exatamente uma vez")]
    InvalidPhaseOrder,

    #[error("Referência inválida: {0}")]
    InvalidReference(String),

    // Falha ao carregar o catálogo (alguma leitura falhou ou veio vazia).
    // Nada é aplicado parcialmente; o cliente pode tentar de novo.
    #[error("Dados indisponíveis: {0}")]
    DataUnavailable(String),

    // --- Obras e cotações ---
    #[error("Obra não encontrada")]
    ObraNotFound,

    #[error("Etapa não encontrada")]
    EtapaNotFound,

    #[error("Cotação não encontrada")]
    CotacaoNotFound,

    #[error("Cotação não está aberta")]
    CotacaoNotOpen,

    #[error("Cotação sem itens")]
    EmptyCotacao,

    // Aviso não bloqueante: o cliente precisa confirmar para seguir.
    #[error("Há materiais fora da etapa atual da obra")]
    OutOfPhaseConfirmationRequired(Vec<ValidationWarning>),

    #[error("Fonte não encontrada: {0}")]
    FontNotFound(String),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

// O erro "de fronteira": já traduzido, com status e corpo prontos.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    /// Status HTTP e chave de mensagem no catálogo de traduções.
    fn status_and_key(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "errors.validation"),
            AppError::EmailAlreadyExists => (StatusCode::CONFLICT, "errors.email_exists"),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "errors.invalid_credentials"),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "errors.invalid_token"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "errors.forbidden"),
            AppError::RoleNotAllowed => (StatusCode::BAD_REQUEST, "errors.role_not_allowed"),
            AppError::GrupoNotFound(_) => (StatusCode::NOT_FOUND, "errors.grupo_not_found"),
            AppError::MaterialNotFound(_) => (StatusCode::NOT_FOUND, "errors.material_not_found"),
            AppError::CronologiaAlreadyExists(_) => (StatusCode::CONFLICT, "errors.cronologia_exists"),
            AppError::InvalidPhaseOrder => (StatusCode::BAD_REQUEST, "errors.invalid_phase_order"),
            AppError::InvalidReference(_) => (StatusCode::UNPROCESSABLE_ENTITY, "errors.invalid_reference"),
            AppError::DataUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "errors.data_unavailable"),
            AppError::ObraNotFound => (StatusCode::NOT_FOUND, "errors.obra_not_found"),
            AppError::EtapaNotFound => (StatusCode::NOT_FOUND, "errors.etapa_not_found"),
            AppError::CotacaoNotFound => (StatusCode::NOT_FOUND, "errors.cotacao_not_found"),
            AppError::CotacaoNotOpen => (StatusCode::CONFLICT, "errors.cotacao_not_open"),
            AppError::EmptyCotacao => (StatusCode::BAD_REQUEST, "errors.empty_cotacao"),
            AppError::OutOfPhaseConfirmationRequired(_) => {
                (StatusCode::CONFLICT, "errors.out_of_phase_confirmation_required")
            }
            // Todos os outros erros viram 500.
            AppError::FontNotFound(_)
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "errors.internal"),
        }
    }

    /// Converte o erro de domínio na resposta traduzida para o idioma do cliente.
    pub fn to_api_error(self, locale: &Locale, store: &I18nStore) -> ApiError {
        let (status, key) = self.status_and_key();

        if status.is_server_error() {
            // O `tracing` loga a mensagem detalhada que `thiserror` nos deu.
            if matches!(self, AppError::DataUnavailable(_)) {
                tracing::warn!("Catálogo indisponível: {}", self);
            } else {
                tracing::error!("Erro Interno do Servidor: {:?}", self);
            }
        }

        let details = match self {
            // Retorna todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = serde_json::Map::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| match &e.message {
                            Some(m) => m.to_string(),
                            None => store.translate(&locale.0, &format!("validation.{}", e.code)),
                        })
                        .collect();
                    details.insert(field.to_string(), json!(messages));
                }
                Some(Value::Object(details))
            }
            AppError::OutOfPhaseConfirmationRequired(warnings) => Some(json!({ "warnings": warnings })),
            AppError::InvalidReference(what) => Some(json!({ "reference": what })),
            AppError::GrupoNotFound(id)
            | AppError::MaterialNotFound(id) => Some(json!({ "id": id })),
            AppError::CronologiaAlreadyExists(c) => Some(json!({ "cronologia": c })),
            _ => None,
        };

        ApiError {
            status,
            error: store.translate(&locale.0, key),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::WarningKind;
    use validator::{ValidationError, ValidationErrors};

    fn pt() -> Locale {
        Locale("pt".to_string())
    }

    #[test]
    fn data_unavailable_is_503() {
        let store = I18nStore::load().unwrap();
        let api = AppError::DataUnavailable("fases vazia".into()).to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(api.details.is_none());
    }

    #[test]
    fn out_of_phase_carries_warnings() {
        let store = I18nStore::load().unwrap();
        let warning = ValidationWarning {
            kind: WarningKind::MaterialForaDaFase,
            material_id: Uuid::nil(),
            material_nome: "Telha cerâmica".into(),
            fase_do_material: Some("Cobertura".into()),
            etapa_atual: "Fundação".into(),
        };
        let api = AppError::OutOfPhaseConfirmationRequired(vec![warning]).to_api_error(&pt(), &store);

        assert_eq!(api.status, StatusCode::CONFLICT);
        let details = api.details.unwrap();
        assert_eq!(details["warnings"][0]["kind"], "MATERIAL_FORA_DA_FASE");
        assert_eq!(details["warnings"][0]["faseDoMaterial"], "Cobertura");
    }

    #[test]
    fn validation_errors_are_listed_per_field() {
        let store = I18nStore::load().unwrap();
        let mut errors = ValidationErrors::new();
        let mut err = ValidationError::new("length");
        err.message = Some("O nome é obrigatório.".into());
        errors.add("nome", err);

        let api = AppError::ValidationError(errors).to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::BAD_REQUEST);
        assert_eq!(api.details.unwrap()["nome"][0], "O nome é obrigatório.");
    }

    #[test]
    fn internal_errors_hide_details() {
        let store = I18nStore::load().unwrap();
        let api = AppError::InternalServerError(anyhow::anyhow!("segredo")).to_api_error(&pt(), &store);
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api.error.contains("segredo"));
        assert!(api.details.is_none());
    }
}
