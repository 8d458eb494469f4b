// src/handlers/fornecedores.rs

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{RequireRole, RoleFornecedor},
    },
    models::{catalog::GrupoInsumo, cotacao::Cotacao},
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GruposAtendidosPayload {
    // Substitui a lista inteira; vazia = não atende nenhum grupo
    pub grupos_insumo_ids: Vec<Uuid>,
}

// GET /api/fornecedores/me/grupos
#[utoipa::path(
    get,
    path = "/api/fornecedores/me/grupos",
    tag = "Fornecedores",
    responses((status = 200, description = "Grupos de insumo atendidos", body = Vec<GrupoInsumo>)),
    security(("api_jwt" = []))
)]
pub async fn list_grupos(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleFornecedor>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let grupos = app_state
        .fornecedor_service
        .list_grupos(user.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(grupos)))
}

// PUT /api/fornecedores/me/grupos
#[utoipa::path(
    put,
    path = "/api/fornecedores/me/grupos",
    tag = "Fornecedores",
    request_body = GruposAtendidosPayload,
    responses(
        (status = 200, description = "Grupos atendidos gravados", body = Vec<GrupoInsumo>),
        (status = 422, description = "Grupo inexistente")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_grupos(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleFornecedor>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<GruposAtendidosPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let grupos = app_state
        .fornecedor_service
        .set_grupos(user.id, &payload.grupos_insumo_ids)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(grupos)))
}

// GET /api/fornecedores/me/cotacoes
#[utoipa::path(
    get,
    path = "/api/fornecedores/me/cotacoes",
    tag = "Fornecedores",
    responses((status = 200, description = "Cotações abertas com itens dos grupos atendidos", body = Vec<Cotacao>)),
    security(("api_jwt" = []))
)]
pub async fn cotacoes_relevantes(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleFornecedor>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let cotacoes = app_state
        .fornecedor_service
        .cotacoes_relevantes(user.id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(cotacoes)))
}
