// src/db/obra_repo.rs

use chrono::NaiveDate;
use sqlx::{types::Json, Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::obra::{Obra, ObraEtapa, ObraStage},
};

const OBRA_COLUMNS: &str = r#"
    id, owner_id, nome, cep, logradouro, numero, bairro, cidade, uf,
    etapa, inicio_recebimento_oferta, stages, created_at, updated_at
"#;

const ETAPA_COLUMNS: &str = r#"
    id, obra_id, fase_id, nome, data_prevista, dias_antecedencia_cotacao,
    is_completed, created_at, updated_at
"#;

// Campos editáveis da obra (endereço, etapa atual, cronograma)
#[derive(Debug, Clone, Default)]
pub struct ObraFields<'a> {
    pub nome: &'a str,
    pub cep: Option<&'a str>,
    pub logradouro: Option<&'a str>,
    pub numero: Option<&'a str>,
    pub bairro: Option<&'a str>,
    pub cidade: Option<&'a str>,
    pub uf: Option<&'a str>,
    pub etapa: Option<&'a str>,
    pub inicio_recebimento_oferta: Option<NaiveDate>,
    pub stages: &'a [ObraStage],
}

#[derive(Debug, Clone, Default)]
pub struct EtapaFields<'a> {
    pub fase_id: Option<Uuid>,
    pub nome: &'a str,
    pub data_prevista: Option<NaiveDate>,
    pub dias_antecedencia_cotacao: Option<i32>,
}

#[derive(Clone)]
pub struct ObraRepository {
    pool: PgPool,
}

impl ObraRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  OBRAS
    // =========================================================================

    pub async fn create_obra<'e, E>(
        &self,
        executor: E,
        owner_id: Uuid,
        fields: &ObraFields<'_>,
    ) -> Result<Obra, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let obra = sqlx::query_as::<_, Obra>(&format!(
            r#"
            INSERT INTO obras (
                owner_id, nome, cep, logradouro, numero, bairro, cidade, uf,
                etapa, inicio_recebimento_oferta, stages
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {OBRA_COLUMNS}
            "#
        ))
        .bind(owner_id)
        .bind(fields.nome)
        .bind(fields.cep)
        .bind(fields.logradouro)
        .bind(fields.numero)
        .bind(fields.bairro)
        .bind(fields.cidade)
        .bind(fields.uf)
        .bind(fields.etapa)
        .bind(fields.inicio_recebimento_oferta)
        .bind(Json(fields.stages))
        .fetch_one(executor)
        .await?;
        Ok(obra)
    }

    pub async fn update_obra<'e, E>(
        &self,
        executor: E,
        obra_id: Uuid,
        fields: &ObraFields<'_>,
    ) -> Result<Option<Obra>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let obra = sqlx::query_as::<_, Obra>(&format!(
            r#"
            UPDATE obras SET
                nome = $2, cep = $3, logradouro = $4, numero = $5, bairro = $6,
                cidade = $7, uf = $8, etapa = $9, inicio_recebimento_oferta = $10,
                stages = $11, updated_at = NOW()
            WHERE id = $1
            RETURNING {OBRA_COLUMNS}
            "#
        ))
        .bind(obra_id)
        .bind(fields.nome)
        .bind(fields.cep)
        .bind(fields.logradouro)
        .bind(fields.numero)
        .bind(fields.bairro)
        .bind(fields.cidade)
        .bind(fields.uf)
        .bind(fields.etapa)
        .bind(fields.inicio_recebimento_oferta)
        .bind(Json(fields.stages))
        .fetch_optional(executor)
        .await?;
        Ok(obra)
    }

    pub async fn find_obra<'e, E>(&self, executor: E, obra_id: Uuid) -> Result<Option<Obra>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let obra = sqlx::query_as::<_, Obra>(&format!("SELECT {OBRA_COLUMNS} FROM obras WHERE id = $1"))
            .bind(obra_id)
            .fetch_optional(executor)
            .await?;
        Ok(obra)
    }

    /// `owner_id = None` lista todas (visão do admin).
    pub async fn list_obras<'e, E>(&self, executor: E, owner_id: Option<Uuid>) -> Result<Vec<Obra>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let obras = sqlx::query_as::<_, Obra>(&format!(
            r#"
            SELECT {OBRA_COLUMNS} FROM obras
            WHERE ($1::uuid IS NULL OR owner_id = $1)
            ORDER BY created_at DESC
            "#
        ))
        .bind(owner_id)
        .fetch_all(executor)
        .await?;
        Ok(obras)
    }

    // =========================================================================
    //  ETAPAS DA OBRA
    // =========================================================================

    pub async fn list_etapas<'e, E>(&self, executor: E, obra_id: Uuid) -> Result<Vec<ObraEtapa>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let etapas = sqlx::query_as::<_, ObraEtapa>(&format!(
            r#"
            SELECT {ETAPA_COLUMNS} FROM obra_etapas
            WHERE obra_id = $1
            ORDER BY data_prevista ASC NULLS LAST, created_at ASC
            "#
        ))
        .bind(obra_id)
        .fetch_all(executor)
        .await?;
        Ok(etapas)
    }

    pub async fn create_etapa<'e, E>(
        &self,
        executor: E,
        obra_id: Uuid,
        fields: &EtapaFields<'_>,
    ) -> Result<ObraEtapa, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, ObraEtapa>(&format!(
            r#"
            INSERT INTO obra_etapas (obra_id, fase_id, nome, data_prevista, dias_antecedencia_cotacao)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ETAPA_COLUMNS}
            "#
        ))
        .bind(obra_id)
        .bind(fields.fase_id)
        .bind(fields.nome)
        .bind(fields.data_prevista)
        .bind(fields.dias_antecedencia_cotacao)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_foreign_key_violation() {
                    return AppError::InvalidReference("faseId".to_string());
                }
            }
            e.into()
        })
    }

    pub async fn update_etapa<'e, E>(
        &self,
        executor: E,
        obra_id: Uuid,
        etapa_id: Uuid,
        fields: &EtapaFields<'_>,
    ) -> Result<Option<ObraEtapa>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, ObraEtapa>(&format!(
            r#"
            UPDATE obra_etapas SET
                fase_id = $3, nome = $4, data_prevista = $5,
                dias_antecedencia_cotacao = $6, updated_at = NOW()
            WHERE id = $2 AND obra_id = $1
            RETURNING {ETAPA_COLUMNS}
            "#
        ))
        .bind(obra_id)
        .bind(etapa_id)
        .bind(fields.fase_id)
        .bind(fields.nome)
        .bind(fields.data_prevista)
        .bind(fields.dias_antecedencia_cotacao)
        .fetch_optional(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_foreign_key_violation() {
                    return AppError::InvalidReference("faseId".to_string());
                }
            }
            e.into()
        })
    }

    pub async fn set_etapa_completed<'e, E>(
        &self,
        executor: E,
        obra_id: Uuid,
        etapa_id: Uuid,
        is_completed: bool,
    ) -> Result<Option<ObraEtapa>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let etapa = sqlx::query_as::<_, ObraEtapa>(&format!(
            r#"
            UPDATE obra_etapas SET is_completed = $3, updated_at = NOW()
            WHERE id = $2 AND obra_id = $1
            RETURNING {ETAPA_COLUMNS}
            "#
        ))
        .bind(obra_id)
        .bind(etapa_id)
        .bind(is_completed)
        .fetch_optional(executor)
        .await?;
        Ok(etapa)
    }
}
