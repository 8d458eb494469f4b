// src/db/cotacao_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::fornecedor_repo::ITEM_ATENDIDO_PELO_FORNECEDOR,
    models::cotacao::{Cotacao, CotacaoItem, CotacaoStatus, NovoCotacaoItem},
};

const COTACAO_COLUMNS: &str = "id, obra_id, cliente_id, status, observacoes, created_at, updated_at";

const ITEM_COLUMNS: &str = r#"
    id, cotacao_id, material_id, nome, unidade, grupo_id, quantidade,
    fase_id, servico_id, created_at
"#;

#[derive(Clone)]
pub struct CotacaoRepository {
    pool: PgPool,
}

impl CotacaoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insere o cabeçalho com o id gerado pelo cliente.
    /// Devolve `None` se esse id já foi gravado (reenvio do mesmo carrinho).
    pub async fn insert_cotacao<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        obra_id: Uuid,
        cliente_id: Uuid,
        observacoes: Option<&str>,
    ) -> Result<Option<Cotacao>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let cotacao = sqlx::query_as::<_, Cotacao>(&format!(
            r#"
            INSERT INTO cotacoes (id, obra_id, cliente_id, observacoes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            RETURNING {COTACAO_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(obra_id)
        .bind(cliente_id)
        .bind(observacoes)
        .fetch_optional(executor)
        .await?;
        Ok(cotacao)
    }

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        cotacao_id: Uuid,
        item: &NovoCotacaoItem,
    ) -> Result<CotacaoItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, CotacaoItem>(&format!(
            r#"
            INSERT INTO cotacao_itens (
                cotacao_id, material_id, nome, unidade, grupo_id, quantidade, fase_id, servico_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(cotacao_id)
        .bind(item.material_id)
        .bind(&item.nome)
        .bind(&item.unidade)
        .bind(item.grupo_id)
        .bind(item.quantidade)
        .bind(item.fase_id)
        .bind(item.servico_id)
        .fetch_one(executor)
        .await?;
        Ok(item)
    }

    pub async fn find_cotacao<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Cotacao>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let cotacao = sqlx::query_as::<_, Cotacao>(&format!(
            "SELECT {COTACAO_COLUMNS} FROM cotacoes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(cotacao)
    }

    pub async fn list_itens<'e, E>(&self, executor: E, cotacao_id: Uuid) -> Result<Vec<CotacaoItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let itens = sqlx::query_as::<_, CotacaoItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM cotacao_itens WHERE cotacao_id = $1 ORDER BY created_at, nome"
        ))
        .bind(cotacao_id)
        .fetch_all(executor)
        .await?;
        Ok(itens)
    }

    /// Filtros opcionais: por cliente e/ou por obra.
    pub async fn list_cotacoes<'e, E>(
        &self,
        executor: E,
        cliente_id: Option<Uuid>,
        obra_id: Option<Uuid>,
    ) -> Result<Vec<Cotacao>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let cotacoes = sqlx::query_as::<_, Cotacao>(&format!(
            r#"
            SELECT {COTACAO_COLUMNS} FROM cotacoes
            WHERE ($1::uuid IS NULL OR cliente_id = $1)
              AND ($2::uuid IS NULL OR obra_id = $2)
            ORDER BY created_at DESC
            "#
        ))
        .bind(cliente_id)
        .bind(obra_id)
        .fetch_all(executor)
        .await?;
        Ok(cotacoes)
    }

    /// Muda o status só se a cotação ainda estiver ABERTA.
    pub async fn close_if_open<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: CotacaoStatus,
    ) -> Result<Option<Cotacao>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let cotacao = sqlx::query_as::<_, Cotacao>(&format!(
            r#"
            UPDATE cotacoes SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'ABERTA'
            RETURNING {COTACAO_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(executor)
        .await?;
        Ok(cotacao)
    }

    /// O fornecedor pode ver a cotação se ela tiver algum material de um grupo seu.
    pub async fn visible_to_fornecedor<'e, E>(
        &self,
        executor: E,
        fornecedor_id: Uuid,
        cotacao_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let visible = sqlx::query_scalar::<_, bool>(&format!(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM cotacao_itens i
                WHERE i.cotacao_id = $2 AND {ITEM_ATENDIDO_PELO_FORNECEDOR}
            )
            "#
        ))
        .bind(fornecedor_id)
        .bind(cotacao_id)
        .fetch_one(executor)
        .await?;
        Ok(visible)
    }
}
