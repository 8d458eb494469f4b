// src/handlers/documents.rs

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
};

// GET /api/cotacoes/{id}/pdf
#[utoipa::path(
    get,
    path = "/api/cotacoes/{id}/pdf",
    tag = "Cotações",
    params(("id" = Uuid, Path, description = "ID da cotação")),
    responses(
        (status = 200, description = "PDF da cotação", content_type = "application/pdf"),
        (status = 404, description = "Cotação não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn generate_cotacao_pdf(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(cotacao_id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let detalhe = app_state
        .cotacao_service
        .detalhe(&user, cotacao_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    // Renderização é CPU pura; fica fora das threads do runtime
    let documents = app_state.document_service.clone();
    let pdf_bytes = tokio::task::spawn_blocking(move || documents.generate_cotacao_pdf(&detalhe))
        .await
        .map_err(|e| AppError::InternalServerError(e.into()))
        .and_then(|result| result)
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    // Configura os Headers para o navegador baixar ou mostrar o PDF
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"cotacao_{}.pdf\"", cotacao_id),
        ),
    ];

    Ok((headers, pdf_bytes).into_response())
}
