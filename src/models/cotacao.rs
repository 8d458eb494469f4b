// src/models/cotacao.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "cotacao_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CotacaoStatus {
    Aberta,
    Fechada,
    Cancelada,
}

// --- Cabeçalho da cotação ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cotacao {
    pub id: Uuid,
    pub obra_id: Uuid,
    pub cliente_id: Uuid,
    pub status: CotacaoStatus,
    #[schema(example = "Entrega no canteiro, portão lateral")]
    pub observacoes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Itens ---
// Nome e unidade são copiados do catálogo no momento do envio.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CotacaoItem {
    pub id: Uuid,
    pub cotacao_id: Uuid,
    pub material_id: Option<Uuid>,
    #[schema(example = "Cimento CP-II 50kg")]
    pub nome: String,
    #[schema(example = "saco")]
    pub unidade: String,
    pub grupo_id: Option<Uuid>,
    #[schema(example = "120")]
    pub quantidade: Decimal,
    pub fase_id: Option<Uuid>,
    pub servico_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// Item já resolvido contra o catálogo, pronto para gravar
#[derive(Debug, Clone, PartialEq)]
pub struct NovoCotacaoItem {
    pub material_id: Uuid,
    pub nome: String,
    pub unidade: String,
    pub grupo_id: Option<Uuid>,
    pub quantidade: Decimal,
    pub fase_id: Option<Uuid>,
    pub servico_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CotacaoDetalhe {
    #[serde(flatten)]
    pub header: Cotacao,
    pub obra_nome: String,
    pub itens: Vec<CotacaoItem>,
}
