// src/handlers/catalog.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::i18n::Locale,
    models::catalog::{CatalogTree, GrupoRelacoes, MaterialRelacoes},
};

// Termo de busca (vazio ou ausente = catálogo inteiro)
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct SearchQuery {
    #[param(example = "cimento")]
    pub q: Option<String>,
}

// GET /api/catalogo
#[utoipa::path(
    get,
    path = "/api/catalogo",
    tag = "Catálogo",
    params(SearchQuery),
    responses(
        (status = 200, description = "Árvore Fase > Serviço > Grupo > Material filtrada", body = CatalogTree),
        (status = 503, description = "Catálogo indisponível no momento")
    ),
    security(("api_jwt" = []))
)]
pub async fn search_catalog(
    State(app_state): State<AppState>,
    locale: Locale,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let tree = app_state
        .catalog_service
        .search(query.q.as_deref().unwrap_or_default())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(tree)))
}

// GET /api/catalogo/materiais/{id}/relacoes
#[utoipa::path(
    get,
    path = "/api/catalogo/materiais/{id}/relacoes",
    tag = "Catálogo",
    params(("id" = Uuid, Path, description = "ID do material")),
    responses(
        (status = 200, description = "Grupos, serviços e fases do material", body = MaterialRelacoes),
        (status = 404, description = "Material não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn material_relacoes(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(material_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let relacoes = app_state
        .catalog_service
        .material_relacoes(material_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(relacoes)))
}

// GET /api/catalogo/grupos/{id}/relacoes
#[utoipa::path(
    get,
    path = "/api/catalogo/grupos/{id}/relacoes",
    tag = "Catálogo",
    params(("id" = Uuid, Path, description = "ID do grupo de insumo")),
    responses(
        (status = 200, description = "Materiais, serviços e fases do grupo", body = GrupoRelacoes),
        (status = 404, description = "Grupo não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn grupo_relacoes(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(grupo_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let relacoes = app_state
        .catalog_service
        .grupo_relacoes(grupo_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(relacoes)))
}
