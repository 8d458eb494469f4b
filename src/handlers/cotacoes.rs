// src/handlers/cotacoes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{RequireRole, RoleCliente},
    },
    models::cotacao::{Cotacao, CotacaoDetalhe},
    services::cotacao_service::{CarrinhoItem, NovaCotacao},
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CarrinhoItemPayload {
    pub material_id: Uuid,

    #[schema(value_type = f64, example = 120)]
    pub quantidade: Decimal,

    // Contexto opcional: de qual grupo/serviço/fase o material foi escolhido
    pub grupo_id: Option<Uuid>,
    pub servico_id: Option<Uuid>,
    pub fase_id: Option<Uuid>,
}

impl From<&CarrinhoItemPayload> for CarrinhoItem {
    fn from(item: &CarrinhoItemPayload) -> Self {
        CarrinhoItem {
            material_id: item.material_id,
            quantidade: item.quantidade,
            grupo_id: item.grupo_id,
            servico_id: item.servico_id,
            fase_id: item.fase_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CotacaoPayload {
    // Gerado no cliente; reenviar com o mesmo id devolve a cotação já gravada
    pub id: Uuid,

    pub itens: Vec<CarrinhoItemPayload>,

    #[validate(length(max = 2000, message = "Observações muito longas."))]
    pub observacoes: Option<String>,

    // Confirma o envio mesmo com materiais fora da etapa atual
    #[serde(default)]
    #[schema(example = false)]
    pub confirmar_fora_de_fase: bool,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListCotacoesQuery {
    pub obra_id: Option<Uuid>,
}

// POST /api/obras/{id}/cotacoes
#[utoipa::path(
    post,
    path = "/api/obras/{id}/cotacoes",
    tag = "Cotações",
    request_body = CotacaoPayload,
    params(("id" = Uuid, Path, description = "ID da obra")),
    responses(
        (status = 201, description = "Cotação criada", body = CotacaoDetalhe),
        (status = 200, description = "Cotação com este id já existia e foi devolvida", body = CotacaoDetalhe),
        (status = 400, description = "Carrinho vazio ou quantidade inválida"),
        (status = 409, description = "Há materiais fora da etapa atual; reenviar com confirmarForaDeFase"),
        (status = 422, description = "Contexto do item não bate com o catálogo")
    ),
    security(("api_jwt" = []))
)]
pub async fn submit_cotacao(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleCliente>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(obra_id): Path<Uuid>,
    Json(payload): Json<CotacaoPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let itens: Vec<CarrinhoItem> = payload.itens.iter().map(CarrinhoItem::from).collect();
    let nova = NovaCotacao {
        id: payload.id,
        obra_id,
        itens: &itens,
        observacoes: payload.observacoes.as_deref(),
        confirmar_fora_de_fase: payload.confirmar_fora_de_fase,
    };

    let (detalhe, created) = app_state
        .cotacao_service
        .submit(&user, &nova)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(detalhe)))
}

// GET /api/obras/{id}/cotacoes
#[utoipa::path(
    get,
    path = "/api/obras/{id}/cotacoes",
    tag = "Cotações",
    params(("id" = Uuid, Path, description = "ID da obra")),
    responses((status = 200, description = "Cotações da obra", body = Vec<Cotacao>)),
    security(("api_jwt" = []))
)]
pub async fn list_cotacoes_da_obra(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(obra_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cotacoes = app_state
        .cotacao_service
        .list(&user, Some(obra_id))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(cotacoes)))
}

// GET /api/cotacoes
#[utoipa::path(
    get,
    path = "/api/cotacoes",
    tag = "Cotações",
    params(ListCotacoesQuery),
    responses((status = 200, description = "Cotações do cliente (todas, para admin)", body = Vec<Cotacao>)),
    security(("api_jwt" = []))
)]
pub async fn list_cotacoes(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<ListCotacoesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let cotacoes = app_state
        .cotacao_service
        .list(&user, query.obra_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(cotacoes)))
}

// GET /api/cotacoes/{id}
#[utoipa::path(
    get,
    path = "/api/cotacoes/{id}",
    tag = "Cotações",
    params(("id" = Uuid, Path, description = "ID da cotação")),
    responses(
        (status = 200, description = "Cotação com itens", body = CotacaoDetalhe),
        (status = 404, description = "Cotação não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_cotacao(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(cotacao_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detalhe = app_state
        .cotacao_service
        .detalhe(&user, cotacao_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(detalhe)))
}

// POST /api/cotacoes/{id}/cancelar
#[utoipa::path(
    post,
    path = "/api/cotacoes/{id}/cancelar",
    tag = "Cotações",
    params(("id" = Uuid, Path, description = "ID da cotação")),
    responses(
        (status = 200, description = "Cotação cancelada", body = Cotacao),
        (status = 409, description = "Cotação já fechada ou cancelada")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancelar_cotacao(
    State(app_state): State<AppState>,
    locale: Locale,
    _guard: RequireRole<RoleCliente>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(cotacao_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cotacao = app_state
        .cotacao_service
        .cancelar(&user, cotacao_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::OK, Json(cotacao)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn cart_payload_maps_to_service_items() {
        let material = Uuid::new_v4();
        let grupo = Uuid::new_v4();
        let payload: CotacaoPayload = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "itens": [
                { "materialId": material, "quantidade": 2.5, "grupoId": grupo },
                { "materialId": material, "quantidade": 10 }
            ]
        }))
        .unwrap();

        assert!(!payload.confirmar_fora_de_fase);
        assert!(payload.validate().is_ok());

        let itens: Vec<CarrinhoItem> = payload.itens.iter().map(CarrinhoItem::from).collect();
        assert_eq!(itens[0].quantidade, Decimal::from_str("2.5").unwrap());
        assert_eq!(itens[0].grupo_id, Some(grupo));
        assert_eq!(itens[1].quantidade, Decimal::from(10));
        assert_eq!(itens[1].servico_id, None);
    }

    #[test]
    fn list_query_reads_obra_id() {
        let obra = Uuid::new_v4();
        let query: ListCotacoesQuery =
            serde_json::from_value(serde_json::json!({ "obraId": obra })).unwrap();
        assert_eq!(query.obra_id, Some(obra));
    }
}
