// src/services/fornecedor_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::FornecedorRepository,
    models::{catalog::GrupoInsumo, cotacao::Cotacao},
};

#[derive(Clone)]
pub struct FornecedorService {
    repo: FornecedorRepository,
    pool: PgPool,
}

impl FornecedorService {
    pub fn new(repo: FornecedorRepository, pool: PgPool) -> Self {
        Self { repo, pool }
    }

    pub async fn list_grupos(&self, fornecedor_id: Uuid) -> Result<Vec<GrupoInsumo>, AppError> {
        self.repo.list_grupos(&self.pool, fornecedor_id).await
    }

    /// Substitui os grupos atendidos e devolve o conjunto gravado.
    pub async fn set_grupos(&self, fornecedor_id: Uuid, grupo_ids: &[Uuid]) -> Result<Vec<GrupoInsumo>, AppError> {
        let mut tx = self.pool.begin().await?;
        self.repo.replace_grupos(&mut tx, fornecedor_id, grupo_ids).await?;
        let grupos = self.repo.list_grupos(&mut *tx, fornecedor_id).await?;
        tx.commit().await?;

        tracing::info!("🏷️ Fornecedor {} atende agora {} grupo(s)", fornecedor_id, grupos.len());
        Ok(grupos)
    }

    pub async fn cotacoes_relevantes(&self, fornecedor_id: Uuid) -> Result<Vec<Cotacao>, AppError> {
        self.repo.list_cotacoes_relevantes(&self.pool, fornecedor_id).await
    }
}
