// src/handlers/obras.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    db::obra_repo::{EtapaFields, ObraFields},
    handlers::catalog::SearchQuery,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{RequireRole, RoleCliente},
    },
    models::{
        catalog::CatalogTree,
        obra::{FaseElegibilidade, Obra, ObraEtapa, ObraStage},
    },
};

// =============================================================================
//  1. OBRAS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObraPayload {
    #[validate(length(min = 1, message = "O nome da obra é obrigatório."))]
    #[schema(example = "Residencial Ipê")]
    pub nome: String,

    #[validate(length(max = 9, message = "CEP inválido."))]
    #[schema(example = "01310-100")]
    pub cep: Option<String>,
    pub logradouro: Option<String>,
    pub numero: Option<String>,
    pub bairro: Option<String>,
    pub cidade: Option<String>,
    #[validate(length(equal = 2, message = "Use a sigla do estado."))]
    #[schema(example = "SP")]
    pub uf: Option<String>,

    // Nome da fase em que a obra está
    #[schema(example = "Fundação")]
    pub etapa: Option<String>,
    #[schema(example = "2025-03-01")]
    pub inicio_recebimento_oferta: Option<NaiveDate>,

    #[serde(default)]
    pub stages: Vec<ObraStage>,
}

impl ObraPayload {
    fn fields(&self) -> ObraFields<'_> {
        ObraFields {
            nome: &self.nome,
            cep: self.cep.as_deref(),
            logradouro: self.logradouro.as_deref(),
            numero: self.numero.as_deref(),
            bairro: self.bairro.as_deref(),
            cidade: self.cidade.as_deref(),
            uf: self.uf.as_deref(),
            // Gravada sem espaços nas pontas; em branco conta como sem etapa
            etapa: self.etapa.as_deref().map(str::trim).filter(|e| !e.is_empty()),
            inicio_recebimento_oferta: self.inicio_recebimento_oferta,
            stages: &self.stages,
        }
    }
}

// POST /api/obras
#[utoipa::path(
    post,
    path = "/api/obras",
    tag = "Obras",
    request_body = ObraPayload,
    responses((status = 201, description = "Obra criada", body = Obra)),
    security(("api_jwt" = []))
)]
pub async fn create_obra(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleCliente>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<ObraPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let obra = app_state
        .obra_service
        .create_obra(&user, &payload.fields())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(obra)))
}

// GET /api/obras
#[utoipa::path(
    get,
    path = "/api/obras",
    tag = "Obras",
    responses((status = 200, description = "Obras do usuário (todas, para admin)", body = Vec<Obra>)),
    security(("api_jwt" = []))
)]
pub async fn list_obras(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleCliente>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let obras = app_state
        .obra_service
        .list_obras(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(obras)))
}

// GET /api/obras/{id}
#[utoipa::path(
    get,
    path = "/api/obras/{id}",
    tag = "Obras",
    params(("id" = Uuid, Path, description = "ID da obra")),
    responses(
        (status = 200, description = "Obra", body = Obra),
        (status = 404, description = "Obra não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_obra(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleCliente>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(obra_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let obra = app_state
        .obra_service
        .get_obra(&user, obra_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(obra)))
}

// PUT /api/obras/{id}
#[utoipa::path(
    put,
    path = "/api/obras/{id}",
    tag = "Obras",
    request_body = ObraPayload,
    params(("id" = Uuid, Path, description = "ID da obra")),
    responses(
        (status = 200, description = "Obra atualizada", body = Obra),
        (status = 404, description = "Obra não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_obra(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleCliente>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(obra_id): Path<Uuid>,
    Json(payload): Json<ObraPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let obra = app_state
        .obra_service
        .update_obra(&user, obra_id, &payload.fields())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(obra)))
}

// =============================================================================
//  2. ETAPAS (cronograma)
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EtapaPayload {
    // Fase do catálogo; sem ela a etapa vale pelo nome
    pub fase_id: Option<Uuid>,

    #[validate(length(min = 1, message = "O nome da etapa é obrigatório."))]
    #[schema(example = "Fundação")]
    pub nome: String,

    #[schema(example = "2025-03-01")]
    pub data_prevista: Option<NaiveDate>,

    #[validate(range(min = 0, message = "A antecedência não pode ser negativa."))]
    #[schema(example = 15)]
    pub dias_antecedencia_cotacao: Option<i32>,
}

impl EtapaPayload {
    fn fields(&self) -> EtapaFields<'_> {
        EtapaFields {
            fase_id: self.fase_id,
            nome: &self.nome,
            data_prevista: self.data_prevista,
            dias_antecedencia_cotacao: self.dias_antecedencia_cotacao,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConcluirEtapaPayload {
    #[schema(example = true)]
    pub is_completed: bool,
}

// GET /api/obras/{id}/etapas
#[utoipa::path(
    get,
    path = "/api/obras/{id}/etapas",
    tag = "Obras",
    params(("id" = Uuid, Path, description = "ID da obra")),
    responses((status = 200, description = "Etapas do cronograma", body = Vec<ObraEtapa>)),
    security(("api_jwt" = []))
)]
pub async fn list_etapas(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleCliente>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(obra_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let etapas = app_state
        .obra_service
        .list_etapas(&user, obra_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(etapas)))
}

// POST /api/obras/{id}/etapas
#[utoipa::path(
    post,
    path = "/api/obras/{id}/etapas",
    tag = "Obras",
    request_body = EtapaPayload,
    params(("id" = Uuid, Path, description = "ID da obra")),
    responses(
        (status = 201, description = "Etapa criada", body = ObraEtapa),
        (status = 422, description = "Fase inexistente")
    ),
    security(("api_jwt" = []))
)]
pub async fn add_etapa(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleCliente>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(obra_id): Path<Uuid>,
    Json(payload): Json<EtapaPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let etapa = app_state
        .obra_service
        .add_etapa(&user, obra_id, &payload.fields())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(etapa)))
}

// PUT /api/obras/{id}/etapas/{etapa_id}
#[utoipa::path(
    put,
    path = "/api/obras/{id}/etapas/{etapa_id}",
    tag = "Obras",
    request_body = EtapaPayload,
    params(
        ("id" = Uuid, Path, description = "ID da obra"),
        ("etapa_id" = Uuid, Path, description = "ID da etapa")
    ),
    responses(
        (status = 200, description = "Etapa atualizada", body = ObraEtapa),
        (status = 404, description = "Obra ou etapa não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_etapa(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleCliente>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((obra_id, etapa_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<EtapaPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let etapa = app_state
        .obra_service
        .update_etapa(&user, obra_id, etapa_id, &payload.fields())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(etapa)))
}

// POST /api/obras/{id}/etapas/{etapa_id}/concluir
#[utoipa::path(
    post,
    path = "/api/obras/{id}/etapas/{etapa_id}/concluir",
    tag = "Obras",
    request_body = ConcluirEtapaPayload,
    params(
        ("id" = Uuid, Path, description = "ID da obra"),
        ("etapa_id" = Uuid, Path, description = "ID da etapa")
    ),
    responses((status = 200, description = "Etapa marcada (ou desmarcada) como concluída", body = ObraEtapa)),
    security(("api_jwt" = []))
)]
pub async fn concluir_etapa(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleCliente>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path((obra_id, etapa_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<ConcluirEtapaPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let etapa = app_state
        .obra_service
        .set_etapa_completed(&user, obra_id, etapa_id, payload.is_completed)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(etapa)))
}

// =============================================================================
//  3. ELEGIBILIDADE E CATÁLOGO DA OBRA
// =============================================================================

// GET /api/obras/{id}/fases-elegiveis
#[utoipa::path(
    get,
    path = "/api/obras/{id}/fases-elegiveis",
    tag = "Obras",
    params(("id" = Uuid, Path, description = "ID da obra")),
    responses((status = 200, description = "Todas as fases, com a janela de cotação de hoje", body = Vec<FaseElegibilidade>)),
    security(("api_jwt" = []))
)]
pub async fn fases_elegiveis(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleCliente>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(obra_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let fases = app_state
        .obra_service
        .fases_elegiveis(&user, obra_id, app_state.config.today())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(fases)))
}

// GET /api/obras/{id}/catalogo
#[utoipa::path(
    get,
    path = "/api/obras/{id}/catalogo",
    tag = "Obras",
    params(("id" = Uuid, Path, description = "ID da obra"), SearchQuery),
    responses(
        (status = 200, description = "Catálogo restrito às fases abertas hoje", body = CatalogTree),
        (status = 503, description = "Catálogo indisponível no momento")
    ),
    security(("api_jwt" = []))
)]
pub async fn catalogo_da_obra(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleCliente>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(obra_id): Path<Uuid>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tree = app_state
        .obra_service
        .catalogo(
            &user,
            obra_id,
            query.q.as_deref().unwrap_or_default(),
            app_state.config.today(),
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(tree)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obra_payload_accepts_legacy_stages() {
        let payload: ObraPayload = serde_json::from_value(serde_json::json!({
            "nome": "Residencial Ipê",
            "uf": "SP",
            "etapa": "Fundação",
            "stages": [
                { "name": "Fundação", "predictedDate": "2025-03-01", "quotationAdvanceDays": 15 },
                { "name": "Alvenaria" }
            ]
        }))
        .unwrap();

        assert!(payload.validate().is_ok());
        let fields = payload.fields();
        assert_eq!(fields.stages.len(), 2);
        assert_eq!(fields.stages[1].predicted_date, None);
        assert_eq!(fields.inicio_recebimento_oferta, None);
    }

    #[test]
    fn etapa_is_trimmed_and_blank_is_none() {
        let payload: ObraPayload = serde_json::from_value(serde_json::json!({
            "nome": "Residencial Ipê",
            "etapa": "  Fundação "
        }))
        .unwrap();
        assert_eq!(payload.fields().etapa, Some("Fundação"));

        let payload: ObraPayload = serde_json::from_value(serde_json::json!({
            "nome": "Residencial Ipê",
            "etapa": "   "
        }))
        .unwrap();
        assert_eq!(payload.fields().etapa, None);
    }

    #[test]
    fn uf_must_be_two_letters() {
        let payload: ObraPayload = serde_json::from_value(serde_json::json!({
            "nome": "Residencial Ipê",
            "uf": "São Paulo"
        }))
        .unwrap();

        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("uf"));
    }

    #[test]
    fn negative_advance_is_rejected() {
        let payload: EtapaPayload = serde_json::from_value(serde_json::json!({
            "nome": "Fundação",
            "dataPrevista": "2025-03-01",
            "diasAntecedenciaCotacao": -1
        }))
        .unwrap();

        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("dias_antecedencia_cotacao"));
    }
}
