// src/services/obra_service.rs

use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        obra_repo::{EtapaFields, ObraFields},
        ObraRepository,
    },
    models::{
        auth::{User, UserRole},
        catalog::CatalogTree,
        obra::{FaseElegibilidade, Obra, ObraEtapa},
    },
    services::{
        catalog_filter::filter_catalog,
        catalog_service::CatalogService,
        eligibility::{eligible_phase_ids, phase_report},
    },
};

/// Só o dono (ou o admin) enxerga a obra. Para os demais ela "não existe".
pub fn ensure_obra_access(user: &User, obra: &Obra) -> Result<(), AppError> {
    if user.role == UserRole::Admin || obra.owner_id == user.id {
        Ok(())
    } else {
        Err(AppError::ObraNotFound)
    }
}

#[derive(Clone)]
pub struct ObraService {
    repo: ObraRepository,
    catalog: CatalogService,
    pool: PgPool,
}

impl ObraService {
    pub fn new(repo: ObraRepository, catalog: CatalogService, pool: PgPool) -> Self {
        Self { repo, catalog, pool }
    }

    // =========================================================================
    //  OBRAS
    // =========================================================================

    pub async fn create_obra(&self, user: &User, fields: &ObraFields<'_>) -> Result<Obra, AppError> {
        let obra = self.repo.create_obra(&self.pool, user.id, fields).await?;
        tracing::info!("🏗️ Obra {} criada por {}", obra.id, user.id);
        Ok(obra)
    }

    pub async fn list_obras(&self, user: &User) -> Result<Vec<Obra>, AppError> {
        let owner = (user.role != UserRole::Admin).then_some(user.id);
        self.repo.list_obras(&self.pool, owner).await
    }

    /// Busca a obra e confere o acesso do usuário.
    pub async fn get_obra(&self, user: &User, obra_id: Uuid) -> Result<Obra, AppError> {
        let obra = self
            .repo
            .find_obra(&self.pool, obra_id)
            .await?
            .ok_or(AppError::ObraNotFound)?;
        ensure_obra_access(user, &obra)?;
        Ok(obra)
    }

    pub async fn update_obra(
        &self,
        user: &User,
        obra_id: Uuid,
        fields: &ObraFields<'_>,
    ) -> Result<Obra, AppError> {
        let mut tx = self.pool.begin().await?;

        let atual = self
            .repo
            .find_obra(&mut *tx, obra_id)
            .await?
            .ok_or(AppError::ObraNotFound)?;
        ensure_obra_access(user, &atual)?;

        let obra = self
            .repo
            .update_obra(&mut *tx, obra_id, fields)
            .await?
            .ok_or(AppError::ObraNotFound)?;

        tx.commit().await?;
        Ok(obra)
    }

    // =========================================================================
    //  ETAPAS
    // =========================================================================

    pub async fn list_etapas(&self, user: &User, obra_id: Uuid) -> Result<Vec<ObraEtapa>, AppError> {
        self.get_obra(user, obra_id).await?;
        self.repo.list_etapas(&self.pool, obra_id).await
    }

    pub async fn add_etapa(
        &self,
        user: &User,
        obra_id: Uuid,
        fields: &EtapaFields<'_>,
    ) -> Result<ObraEtapa, AppError> {
        self.get_obra(user, obra_id).await?;
        self.repo.create_etapa(&self.pool, obra_id, fields).await
    }

    pub async fn update_etapa(
        &self,
        user: &User,
        obra_id: Uuid,
        etapa_id: Uuid,
        fields: &EtapaFields<'_>,
    ) -> Result<ObraEtapa, AppError> {
        self.get_obra(user, obra_id).await?;
        self.repo
            .update_etapa(&self.pool, obra_id, etapa_id, fields)
            .await?
            .ok_or(AppError::EtapaNotFound)
    }

    /// Etapa concluída fecha a janela de cotação daquela fase.
    pub async fn set_etapa_completed(
        &self,
        user: &User,
        obra_id: Uuid,
        etapa_id: Uuid,
        is_completed: bool,
    ) -> Result<ObraEtapa, AppError> {
        self.get_obra(user, obra_id).await?;
        let etapa = self
            .repo
            .set_etapa_completed(&self.pool, obra_id, etapa_id, is_completed)
            .await?
            .ok_or(AppError::EtapaNotFound)?;

        tracing::info!("✔️ Etapa '{}' da obra {} marcada como concluída = {}", etapa.nome, obra_id, is_completed);
        Ok(etapa)
    }

    // =========================================================================
    //  ELEGIBILIDADE E CATÁLOGO DA OBRA
    // =========================================================================

    pub async fn fases_elegiveis(
        &self,
        user: &User,
        obra_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<FaseElegibilidade>, AppError> {
        let obra = self.get_obra(user, obra_id).await?;
        let etapas = self.repo.list_etapas(&self.pool, obra_id).await?;
        let snapshot = self.catalog.snapshot().await?;

        Ok(phase_report(&snapshot.graph, &obra, &etapas, today))
    }

    /// Árvore do catálogo restrita às fases abertas para cotação hoje.
    pub async fn catalogo(
        &self,
        user: &User,
        obra_id: Uuid,
        query: &str,
        today: NaiveDate,
    ) -> Result<CatalogTree, AppError> {
        let obra = self.get_obra(user, obra_id).await?;
        let etapas = self.repo.list_etapas(&self.pool, obra_id).await?;
        let snapshot = self.catalog.snapshot().await?;

        let permitidas = eligible_phase_ids(&snapshot.graph, &obra, &etapas, today);
        tracing::debug!("Obra {}: {} fases abertas em {}", obra_id, permitidas.len(), today);

        Ok(filter_catalog(&snapshot.graph, query, Some(&permitidas)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::eligibility::tests::obra;
    use chrono::Utc;

    fn user(role: UserRole) -> User {
        User {
            id: Uuid::new_v4(),
            email: "cliente@obra.com".into(),
            password_hash: String::new(),
            nome: "Cliente".into(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn owner_and_admin_can_access() {
        let dono = user(UserRole::Cliente);
        let mut obra = obra(None, None, vec![]);
        obra.owner_id = dono.id;

        assert!(ensure_obra_access(&dono, &obra).is_ok());
        assert!(ensure_obra_access(&user(UserRole::Admin), &obra).is_ok());
    }

    #[test]
    fn other_users_see_not_found() {
        let obra = obra(None, None, vec![]);
        let err = ensure_obra_access(&user(UserRole::Cliente), &obra).unwrap_err();
        assert!(matches!(err, AppError::ObraNotFound));

        let err = ensure_obra_access(&user(UserRole::Fornecedor), &obra).unwrap_err();
        assert!(matches!(err, AppError::ObraNotFound));
    }
}
