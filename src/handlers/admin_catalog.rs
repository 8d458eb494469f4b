// src/handlers/admin_catalog.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    db::catalog_repo::CatalogTable,
    middleware::{
        i18n::Locale,
        rbac::{RequireRole, RoleAdmin},
    },
    models::catalog::{CatalogStats, Fase, GrupoInsumo, MaterialDetalhe, ServicoDetalhe},
};

// Todas as escritas são "upsert" pelo id da URL: repetir o PUT não duplica nada.

// =============================================================================
//  ÁREA 1: FASES
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertFasePayload {
    #[validate(range(min = 1, message = "A cronologia deve ser maior que zero."))]
    #[schema(example = 1)]
    pub cronologia: i32,

    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    #[schema(example = "Fundação")]
    pub nome: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReorderFasesPayload {
    // Ids de todas as fases, na nova ordem
    #[validate(length(min = 1, message = "Informe a nova ordem das fases."))]
    pub ordem: Vec<Uuid>,
}

// GET /api/admin/fases
#[utoipa::path(
    get,
    path = "/api/admin/fases",
    tag = "Admin Catálogo",
    responses((status = 200, description = "Fases em ordem de cronologia", body = Vec<Fase>)),
    security(("api_jwt" = []))
)]
pub async fn list_fases(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleAdmin>,
) -> Result<impl IntoResponse, ApiError> {
    let fases = app_state
        .catalog_service
        .list_fases()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(fases)))
}

// PUT /api/admin/fases/{id}
#[utoipa::path(
    put,
    path = "/api/admin/fases/{id}",
    tag = "Admin Catálogo",
    request_body = UpsertFasePayload,
    params(("id" = Uuid, Path, description = "ID da fase (gerado pelo cliente na criação)")),
    responses(
        (status = 200, description = "Fase gravada", body = Fase),
        (status = 409, description = "Cronologia já usada por outra fase")
    ),
    security(("api_jwt" = []))
)]
pub async fn upsert_fase(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleAdmin>,
    Path(fase_id): Path<Uuid>,
    Json(payload): Json<UpsertFasePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let fase = app_state
        .catalog_service
        .upsert_fase(fase_id, payload.cronologia, &payload.nome)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(fase)))
}

// POST /api/admin/fases/ordem
#[utoipa::path(
    post,
    path = "/api/admin/fases/ordem",
    tag = "Admin Catálogo",
    request_body = ReorderFasesPayload,
    responses(
        (status = 200, description = "Cronologias renumeradas (1..n)", body = Vec<Fase>),
        (status = 400, description = "A lista não contém todas as fases exatamente uma vez")
    ),
    security(("api_jwt" = []))
)]
pub async fn reorder_fases(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleAdmin>,
    Json(payload): Json<ReorderFasesPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let fases = app_state
        .catalog_service
        .reorder_fases(&payload.ordem)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(fases)))
}

// DELETE /api/admin/fases/{id}
#[utoipa::path(
    delete,
    path = "/api/admin/fases/{id}",
    tag = "Admin Catálogo",
    params(("id" = Uuid, Path, description = "ID da fase")),
    responses((status = 204, description = "Fase removida (ou já inexistente)")),
    security(("api_jwt" = []))
)]
pub async fn delete_fase(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleAdmin>,
    Path(fase_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    delete_entity(&app_state, &locale, CatalogTable::Fases, fase_id).await
}

// =============================================================================
//  ÁREA 2: SERVIÇOS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertServicoPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    #[schema(example = "Concretagem de sapatas")]
    pub nome: String,

    #[serde(default)]
    #[schema(example = 10)]
    pub ordem: i32,

    pub descricao: Option<String>,

    #[serde(default)]
    pub fase_ids: Vec<Uuid>,

    #[serde(default)]
    pub grupos_insumo_ids: Vec<Uuid>,
}

// GET /api/admin/servicos
#[utoipa::path(
    get,
    path = "/api/admin/servicos",
    tag = "Admin Catálogo",
    responses((status = 200, description = "Serviços com seus vínculos", body = Vec<ServicoDetalhe>)),
    security(("api_jwt" = []))
)]
pub async fn list_servicos(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleAdmin>,
) -> Result<impl IntoResponse, ApiError> {
    let servicos = app_state
        .catalog_service
        .list_servicos()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(servicos)))
}

// PUT /api/admin/servicos/{id}
#[utoipa::path(
    put,
    path = "/api/admin/servicos/{id}",
    tag = "Admin Catálogo",
    request_body = UpsertServicoPayload,
    params(("id" = Uuid, Path, description = "ID do serviço")),
    responses(
        (status = 200, description = "Serviço gravado; os vínculos informados substituem os anteriores", body = ServicoDetalhe),
        (status = 422, description = "Fase ou grupo inexistente")
    ),
    security(("api_jwt" = []))
)]
pub async fn upsert_servico(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleAdmin>,
    Path(servico_id): Path<Uuid>,
    Json(payload): Json<UpsertServicoPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let servico = app_state
        .catalog_service
        .upsert_servico(
            servico_id,
            &payload.nome,
            payload.ordem,
            payload.descricao.as_deref(),
            &payload.fase_ids,
            &payload.grupos_insumo_ids,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(servico)))
}

// DELETE /api/admin/servicos/{id}
#[utoipa::path(
    delete,
    path = "/api/admin/servicos/{id}",
    tag = "Admin Catálogo",
    params(("id" = Uuid, Path, description = "ID do serviço")),
    responses((status = 204, description = "Serviço removido (ou já inexistente)")),
    security(("api_jwt" = []))
)]
pub async fn delete_servico(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleAdmin>,
    Path(servico_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    delete_entity(&app_state, &locale, CatalogTable::Servicos, servico_id).await
}

// =============================================================================
//  ÁREA 3: GRUPOS DE INSUMO
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertGrupoPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    #[schema(example = "Cimento e argamassa")]
    pub nome: String,
    pub descricao: Option<String>,
}

// GET /api/admin/grupos
#[utoipa::path(
    get,
    path = "/api/admin/grupos",
    tag = "Admin Catálogo",
    responses((status = 200, description = "Grupos de insumo", body = Vec<GrupoInsumo>)),
    security(("api_jwt" = []))
)]
pub async fn list_grupos(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleAdmin>,
) -> Result<impl IntoResponse, ApiError> {
    let grupos = app_state
        .catalog_service
        .list_grupos()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(grupos)))
}

// PUT /api/admin/grupos/{id}
#[utoipa::path(
    put,
    path = "/api/admin/grupos/{id}",
    tag = "Admin Catálogo",
    request_body = UpsertGrupoPayload,
    params(("id" = Uuid, Path, description = "ID do grupo")),
    responses((status = 200, description = "Grupo gravado", body = GrupoInsumo)),
    security(("api_jwt" = []))
)]
pub async fn upsert_grupo(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleAdmin>,
    Path(grupo_id): Path<Uuid>,
    Json(payload): Json<UpsertGrupoPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let grupo = app_state
        .catalog_service
        .upsert_grupo(grupo_id, &payload.nome, payload.descricao.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(grupo)))
}

// DELETE /api/admin/grupos/{id}
#[utoipa::path(
    delete,
    path = "/api/admin/grupos/{id}",
    tag = "Admin Catálogo",
    params(("id" = Uuid, Path, description = "ID do grupo")),
    responses((status = 204, description = "Grupo removido; materiais e serviços continuam existindo")),
    security(("api_jwt" = []))
)]
pub async fn delete_grupo(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleAdmin>,
    Path(grupo_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    delete_entity(&app_state, &locale, CatalogTable::Grupos, grupo_id).await
}

// =============================================================================
//  ÁREA 4: MATERIAIS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertMaterialPayload {
    #[validate(length(min = 1, message = "O nome é obrigatório."))]
    #[schema(example = "Cimento CP-II 50kg")]
    pub nome: String,

    #[validate(length(min = 1, message = "A unidade é obrigatória."))]
    #[schema(example = "saco")]
    pub unidade: String,

    pub descricao: Option<String>,

    #[serde(default)]
    pub grupos_insumo_ids: Vec<Uuid>,
}

// GET /api/admin/materiais
#[utoipa::path(
    get,
    path = "/api/admin/materiais",
    tag = "Admin Catálogo",
    responses((status = 200, description = "Materiais com seus grupos", body = Vec<MaterialDetalhe>)),
    security(("api_jwt" = []))
)]
pub async fn list_materiais(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleAdmin>,
) -> Result<impl IntoResponse, ApiError> {
    let materiais = app_state
        .catalog_service
        .list_materiais()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(materiais)))
}

// PUT /api/admin/materiais/{id}
#[utoipa::path(
    put,
    path = "/api/admin/materiais/{id}",
    tag = "Admin Catálogo",
    request_body = UpsertMaterialPayload,
    params(("id" = Uuid, Path, description = "ID do material")),
    responses(
        (status = 200, description = "Material gravado", body = MaterialDetalhe),
        (status = 422, description = "Grupo inexistente")
    ),
    security(("api_jwt" = []))
)]
pub async fn upsert_material(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleAdmin>,
    Path(material_id): Path<Uuid>,
    Json(payload): Json<UpsertMaterialPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let material = app_state
        .catalog_service
        .upsert_material(
            material_id,
            &payload.nome,
            &payload.unidade,
            payload.descricao.as_deref(),
            &payload.grupos_insumo_ids,
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(material)))
}

// DELETE /api/admin/materiais/{id}
#[utoipa::path(
    delete,
    path = "/api/admin/materiais/{id}",
    tag = "Admin Catálogo",
    params(("id" = Uuid, Path, description = "ID do material")),
    responses((status = 204, description = "Material removido (ou já inexistente)")),
    security(("api_jwt" = []))
)]
pub async fn delete_material(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleAdmin>,
    Path(material_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    delete_entity(&app_state, &locale, CatalogTable::Materiais, material_id).await
}

// =============================================================================
//  ÁREA 5: RECARGA
// =============================================================================

// POST /api/admin/catalogo/reload
#[utoipa::path(
    post,
    path = "/api/admin/catalogo/reload",
    tag = "Admin Catálogo",
    responses(
        (status = 200, description = "Catálogo recarregado do banco", body = CatalogStats),
        (status = 503, description = "Falha em alguma leitura; o snapshot anterior foi mantido")
    ),
    security(("api_jwt" = []))
)]
pub async fn reload_catalog(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleAdmin>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = app_state
        .catalog_service
        .reload()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(stats)))
}

async fn delete_entity(
    app_state: &AppState,
    locale: &Locale,
    kind: CatalogTable,
    id: Uuid,
) -> Result<StatusCode, ApiError> {
    app_state
        .catalog_service
        .delete(kind, id)
        .await
        .map_err(|e| e.to_api_error(locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}
