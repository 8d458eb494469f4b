// src/db/catalog_repo.rs

use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::catalog::{Fase, GrupoInsumo, Material, MaterialGrupo, Servico, ServicoFase, ServicoGrupo},
    services::catalog_service::CatalogSource,
};

#[derive(Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

// Traduz violação de FK em referência inválida (id de vínculo que não existe)
fn map_link_error(e: sqlx::Error, what: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_foreign_key_violation() {
            return AppError::InvalidReference(what.to_string());
        }
    }
    e.into()
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  FASES
    // =========================================================================

    /// Cria ou atualiza pelo id (reenvio com o mesmo id não duplica).
    pub async fn upsert_fase<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        cronologia: i32,
        nome: &str,
    ) -> Result<Fase, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Fase>(
            r#"
            INSERT INTO fases (id, cronologia, nome)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
                SET cronologia = EXCLUDED.cronologia,
                    nome = EXCLUDED.nome,
                    updated_at = NOW()
            RETURNING id, cronologia, nome
            "#,
        )
        .bind(id)
        .bind(cronologia)
        .bind(nome)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::CronologiaAlreadyExists(cronologia);
                }
            }
            e.into()
        })
    }

    pub async fn list_fase_ids<'e, E>(&self, executor: E) -> Result<Vec<Uuid>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM fases ORDER BY cronologia")
            .fetch_all(executor)
            .await?;
        Ok(ids)
    }

    // A unique de cronologia é DEFERRABLE: dentro da transação as fases podem
    // trocar de posição e a checagem acontece no commit.
    pub async fn defer_cronologia_check<'e, E>(&self, executor: E) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("SET CONSTRAINTS fases_cronologia_key DEFERRED")
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn set_cronologia<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        cronologia: i32,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE fases SET cronologia = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(cronologia)
            .execute(executor)
            .await?;
        Ok(())
    }

    // =========================================================================
    //  SERVIÇOS
    // =========================================================================

    pub async fn upsert_servico<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        nome: &str,
        ordem: i32,
        descricao: Option<&str>,
    ) -> Result<Servico, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let servico = sqlx::query_as::<_, Servico>(
            r#"
            INSERT INTO servicos (id, nome, ordem, descricao)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
                SET nome = EXCLUDED.nome,
                    ordem = EXCLUDED.ordem,
                    descricao = EXCLUDED.descricao,
                    updated_at = NOW()
            RETURNING id, nome, ordem, descricao
            "#,
        )
        .bind(id)
        .bind(nome)
        .bind(ordem)
        .bind(descricao)
        .fetch_one(executor)
        .await?;
        Ok(servico)
    }

    /// Substitui o conjunto de fases do serviço.
    pub async fn replace_servico_fases(
        &self,
        conn: &mut sqlx::PgConnection,
        servico_id: Uuid,
        fase_ids: &[Uuid],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM servico_fase WHERE servico_id = $1")
            .bind(servico_id)
            .execute(&mut *conn)
            .await?;

        // unnest + ON CONFLICT: ids repetidos no payload não quebram a PK
        sqlx::query(
            r#"
            INSERT INTO servico_fase (servico_id, fase_id)
            SELECT $1, unnest($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(servico_id)
        .bind(fase_ids)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_link_error(e, "faseIds"))?;
        Ok(())
    }

    pub async fn replace_servico_grupos(
        &self,
        conn: &mut sqlx::PgConnection,
        servico_id: Uuid,
        grupo_ids: &[Uuid],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM servico_grupo WHERE servico_id = $1")
            .bind(servico_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO servico_grupo (servico_id, grupo_id)
            SELECT $1, unnest($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(servico_id)
        .bind(grupo_ids)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_link_error(e, "gruposInsumoIds"))?;
        Ok(())
    }

    // =========================================================================
    //  GRUPOS DE INSUMO
    // =========================================================================

    pub async fn upsert_grupo<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        nome: &str,
        descricao: Option<&str>,
    ) -> Result<GrupoInsumo, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let grupo = sqlx::query_as::<_, GrupoInsumo>(
            r#"
            INSERT INTO grupos_insumo (id, nome, descricao)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
                SET nome = EXCLUDED.nome,
                    descricao = EXCLUDED.descricao,
                    updated_at = NOW()
            RETURNING id, nome, descricao
            "#,
        )
        .bind(id)
        .bind(nome)
        .bind(descricao)
        .fetch_one(executor)
        .await?;
        Ok(grupo)
    }

    // =========================================================================
    //  MATERIAIS
    // =========================================================================

    pub async fn upsert_material<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        nome: &str,
        unidade: &str,
        descricao: Option<&str>,
    ) -> Result<Material, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let material = sqlx::query_as::<_, Material>(
            r#"
            INSERT INTO materiais (id, nome, unidade, descricao)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
                SET nome = EXCLUDED.nome,
                    unidade = EXCLUDED.unidade,
                    descricao = EXCLUDED.descricao,
                    updated_at = NOW()
            RETURNING id, nome, unidade, descricao
            "#,
        )
        .bind(id)
        .bind(nome)
        .bind(unidade)
        .bind(descricao)
        .fetch_one(executor)
        .await?;
        Ok(material)
    }

    pub async fn replace_material_grupos(
        &self,
        conn: &mut sqlx::PgConnection,
        material_id: Uuid,
        grupo_ids: &[Uuid],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM material_grupo WHERE material_id = $1")
            .bind(material_id)
            .execute(&mut *conn)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO material_grupo (material_id, grupo_id)
            SELECT $1, unnest($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(material_id)
        .bind(grupo_ids)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_link_error(e, "gruposInsumoIds"))?;
        Ok(())
    }

    // =========================================================================
    //  REMOÇÃO
    // =========================================================================

    /// Apaga a entidade; o ON DELETE CASCADE limpa só as linhas de junção.
    /// Devolve `false` quando o id já não existia (delete idempotente).
    pub async fn delete<'e, E>(&self, executor: E, kind: CatalogTable, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", kind.table()))
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// Tabelas de entidade do catálogo (nomes fixos, nunca vindos do cliente)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogTable {
    Fases,
    Servicos,
    Grupos,
    Materiais,
}

impl CatalogTable {
    fn table(self) -> &'static str {
        match self {
            CatalogTable::Fases => "fases",
            CatalogTable::Servicos => "servicos",
            CatalogTable::Grupos => "grupos_insumo",
            CatalogTable::Materiais => "materiais",
        }
    }
}

// Leituras completas usadas pela carga do grafo
#[async_trait]
impl CatalogSource for CatalogRepository {
    async fn fases(&self) -> Result<Vec<Fase>, AppError> {
        Ok(sqlx::query_as::<_, Fase>("SELECT id, cronologia, nome FROM fases ORDER BY cronologia")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn servicos(&self) -> Result<Vec<Servico>, AppError> {
        Ok(sqlx::query_as::<_, Servico>("SELECT id, nome, ordem, descricao FROM servicos")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn grupos(&self) -> Result<Vec<GrupoInsumo>, AppError> {
        Ok(sqlx::query_as::<_, GrupoInsumo>("SELECT id, nome, descricao FROM grupos_insumo")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn materiais(&self) -> Result<Vec<Material>, AppError> {
        Ok(sqlx::query_as::<_, Material>("SELECT id, nome, unidade, descricao FROM materiais")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn servico_fase(&self) -> Result<Vec<ServicoFase>, AppError> {
        Ok(sqlx::query_as::<_, ServicoFase>("SELECT servico_id, fase_id FROM servico_fase")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn servico_grupo(&self) -> Result<Vec<ServicoGrupo>, AppError> {
        Ok(sqlx::query_as::<_, ServicoGrupo>("SELECT servico_id, grupo_id FROM servico_grupo")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn material_grupo(&self) -> Result<Vec<MaterialGrupo>, AppError> {
        Ok(sqlx::query_as::<_, MaterialGrupo>("SELECT material_id, grupo_id FROM material_grupo")
            .fetch_all(&self.pool)
            .await?)
    }
}
