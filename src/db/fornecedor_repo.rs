// src/db/fornecedor_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::{catalog::GrupoInsumo, cotacao::Cotacao}};

// Item `i` atendido pelo fornecedor `$1`: pelo grupo gravado no item ou por
// qualquer grupo em que o material está hoje no catálogo.
pub(crate) const ITEM_ATENDIDO_PELO_FORNECEDOR: &str = r#"
    EXISTS (
        SELECT 1
        FROM fornecedor_grupo fg
        WHERE fg.fornecedor_id = $1
          AND (
            fg.grupo_id = i.grupo_id
            OR EXISTS (
                SELECT 1 FROM material_grupo mg
                WHERE mg.material_id = i.material_id AND mg.grupo_id = fg.grupo_id
            )
          )
    )
"#;

#[derive(Clone)]
pub struct FornecedorRepository {
    pool: PgPool,
}

impl FornecedorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_grupos<'e, E>(&self, executor: E, fornecedor_id: Uuid) -> Result<Vec<GrupoInsumo>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let grupos = sqlx::query_as::<_, GrupoInsumo>(
            r#"
            SELECT g.id, g.nome, g.descricao
            FROM fornecedor_grupo fg
            JOIN grupos_insumo g ON g.id = fg.grupo_id
            WHERE fg.fornecedor_id = $1
            ORDER BY g.nome
            "#,
        )
        .bind(fornecedor_id)
        .fetch_all(executor)
        .await?;
        Ok(grupos)
    }

    /// Troca o conjunto inteiro de grupos atendidos pelo fornecedor.
    pub async fn replace_grupos(
        &self,
        conn: &mut sqlx::PgConnection,
        fornecedor_id: Uuid,
        grupo_ids: &[Uuid],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM fornecedor_grupo WHERE fornecedor_id = $1")
            .bind(fornecedor_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO fornecedor_grupo (fornecedor_id, grupo_id)
            SELECT $1, unnest($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(fornecedor_id)
        .bind(grupo_ids)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_foreign_key_violation() {
                    return AppError::InvalidReference("grupoIds".to_string());
                }
            }
            e.into()
        })?;
        Ok(())
    }

    /// Cotações abertas com pelo menos um material de um grupo que o fornecedor atende.
    pub async fn list_cotacoes_relevantes<'e, E>(
        &self,
        executor: E,
        fornecedor_id: Uuid,
    ) -> Result<Vec<Cotacao>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let cotacoes = sqlx::query_as::<_, Cotacao>(&cotacoes_relevantes_sql())
            .bind(fornecedor_id)
            .fetch_all(executor)
            .await?;
        Ok(cotacoes)
    }
}

fn cotacoes_relevantes_sql() -> String {
    format!(
        r#"
        SELECT c.id, c.obra_id, c.cliente_id, c.status, c.observacoes, c.created_at, c.updated_at
        FROM cotacoes c
        WHERE c.status = 'ABERTA'
          AND EXISTS (
            SELECT 1 FROM cotacao_itens i
            WHERE i.cotacao_id = c.id AND {ITEM_ATENDIDO_PELO_FORNECEDOR}
          )
        ORDER BY c.created_at DESC
        "#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compacto(sql: &str) -> String {
        sql.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn supplier_match_covers_every_group_of_the_material() {
        let sql = compacto(ITEM_ATENDIDO_PELO_FORNECEDOR);
        assert!(sql.contains("fg.grupo_id = i.grupo_id"));
        assert!(sql.contains("mg.material_id = i.material_id AND mg.grupo_id = fg.grupo_id"));
        assert!(sql.contains("fg.fornecedor_id = $1"));
    }

    #[test]
    fn relevant_list_only_shows_open_quotations() {
        let sql = compacto(&cotacoes_relevantes_sql());
        assert!(sql.contains("c.status = 'ABERTA'"));
        assert!(sql.contains(&compacto(ITEM_ATENDIDO_PELO_FORNECEDOR)));
    }
}
