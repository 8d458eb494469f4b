// src/services/catalog_service.rs

use async_trait::async_trait;
use sqlx::PgPool;
use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{catalog_repo::CatalogTable, CatalogRepository},
    models::catalog::{
        CatalogStats, CatalogTree, Fase, GrupoInsumo, GrupoRelacoes, Material, MaterialDetalhe,
        MaterialGrupo, MaterialRelacoes, Servico, ServicoDetalhe, ServicoFase, ServicoGrupo,
    },
    services::{
        catalog_filter::filter_catalog,
        catalog_graph::{CatalogGraph, CatalogRows},
    },
};

// =============================================================================
//  ORIGEM DOS DADOS
// =============================================================================

/// Leituras completas de cada tabela do catálogo.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fases(&self) -> Result<Vec<Fase>, AppError>;
    async fn servicos(&self) -> Result<Vec<Servico>, AppError>;
    async fn grupos(&self) -> Result<Vec<GrupoInsumo>, AppError>;
    async fn materiais(&self) -> Result<Vec<Material>, AppError>;
    async fn servico_fase(&self) -> Result<Vec<ServicoFase>, AppError>;
    async fn servico_grupo(&self) -> Result<Vec<ServicoGrupo>, AppError>;
    async fn material_grupo(&self) -> Result<Vec<MaterialGrupo>, AppError>;
}

/// Dispara as sete leituras em paralelo e só devolve se todas deram certo.
/// Catálogo sem fases também conta como indisponível.
pub async fn load_rows(source: &dyn CatalogSource) -> Result<CatalogRows, AppError> {
    let (fases, servicos, grupos, materiais, servico_fase, servico_grupo, material_grupo) = tokio::try_join!(
        source.fases(),
        source.servicos(),
        source.grupos(),
        source.materiais(),
        source.servico_fase(),
        source.servico_grupo(),
        source.material_grupo(),
    )
    .map_err(|e| {
        tracing::warn!("Carga do catálogo abortada: {}", e);
        AppError::DataUnavailable(e.to_string())
    })?;

    if fases.is_empty() {
        tracing::warn!("Carga do catálogo abortada: nenhuma fase cadastrada");
        return Err(AppError::DataUnavailable("tabela de fases vazia".to_string()));
    }

    Ok(CatalogRows {
        fases,
        servicos,
        grupos,
        materiais,
        servico_fase,
        servico_grupo,
        material_grupo,
    })
}

// =============================================================================
//  SNAPSHOT EM MEMÓRIA
// =============================================================================

// Linhas + grafo construído a partir delas. Imutável depois de criado.
#[derive(Debug)]
pub struct CatalogSnapshot {
    pub rows: CatalogRows,
    pub graph: CatalogGraph,
    loaded_at: Instant,
}

impl CatalogSnapshot {
    fn new(rows: CatalogRows, loaded_at: Instant) -> Self {
        let graph = CatalogGraph::build(&rows);
        Self { rows, graph, loaded_at }
    }
}

#[derive(Clone)]
pub struct SnapshotCache {
    source: Arc<dyn CatalogSource>,
    ttl: Duration,
    slot: Arc<RwLock<Option<Arc<CatalogSnapshot>>>>,
}

impl SnapshotCache {
    pub fn new(source: Arc<dyn CatalogSource>, ttl: Duration) -> Self {
        Self { source, ttl, slot: Arc::new(RwLock::new(None)) }
    }

    /// Snapshot em cache; recarrega se não existe ou passou do TTL.
    pub async fn current(&self) -> Result<Arc<CatalogSnapshot>, AppError> {
        if let Some(snapshot) = self.slot.read().await.as_ref() {
            if snapshot.loaded_at.elapsed() < self.ttl {
                return Ok(snapshot.clone());
            }
        }
        self.reload().await
    }

    /// Recarga completa. Se falhar, o snapshot anterior continua no lugar.
    pub async fn reload(&self) -> Result<Arc<CatalogSnapshot>, AppError> {
        let started = Instant::now();
        let rows = load_rows(self.source.as_ref()).await?;
        let snapshot = Arc::new(CatalogSnapshot::new(rows, Instant::now()));

        let stats = snapshot.graph.stats();
        tracing::info!(
            "📚 Catálogo carregado em {:?}: {} fases, {} serviços, {} grupos, {} materiais",
            started.elapsed(),
            stats.fases,
            stats.servicos,
            stats.grupos,
            stats.materiais
        );

        *self.slot.write().await = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Aplica na cópia em memória uma escrita que o banco já confirmou
    /// (última escrita vence). Sem snapshot carregado não há o que atualizar.
    pub async fn apply<F>(&self, change: F)
    where
        F: FnOnce(&mut CatalogRows),
    {
        let mut slot = self.slot.write().await;
        if let Some(current) = slot.as_ref() {
            let mut rows = current.rows.clone();
            change(&mut rows);
            *slot = Some(Arc::new(CatalogSnapshot::new(rows, current.loaded_at)));
        }
    }
}

// =============================================================================
//  CONSULTAS PURAS SOBRE O GRAFO
// =============================================================================

pub fn material_relacoes(graph: &CatalogGraph, material_id: Uuid) -> Option<MaterialRelacoes> {
    let material = graph.material(material_id)?.clone();
    Some(MaterialRelacoes {
        material,
        grupos: graph.groups_by_material(material_id).into_iter().cloned().collect(),
        servicos: graph.services_by_material(material_id).into_iter().cloned().collect(),
        fases: graph.phases_by_material(material_id).into_iter().cloned().collect(),
    })
}

pub fn grupo_relacoes(graph: &CatalogGraph, grupo_id: Uuid) -> Option<GrupoRelacoes> {
    let grupo = graph.grupo(grupo_id)?.clone();
    Some(GrupoRelacoes {
        grupo,
        materiais: graph.materials_by_group(grupo_id).into_iter().cloned().collect(),
        servicos: graph.services_by_group(grupo_id).into_iter().cloned().collect(),
        fases: graph.phases_by_group(grupo_id).into_iter().cloned().collect(),
    })
}

/// A nova ordem precisa citar cada fase existente exatamente uma vez.
pub fn validate_phase_order(existentes: &[Uuid], ordem: &[Uuid]) -> Result<(), AppError> {
    let pedidas: HashSet<Uuid> = ordem.iter().copied().collect();
    let atuais: HashSet<Uuid> = existentes.iter().copied().collect();

    if pedidas.len() != ordem.len() || pedidas != atuais {
        return Err(AppError::InvalidPhaseOrder);
    }
    Ok(())
}

// Remove ids repetidos mantendo a ordem de chegada
fn dedup_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

// =============================================================================
//  SERVIÇO
// =============================================================================

#[derive(Clone)]
pub struct CatalogService {
    repo: CatalogRepository,
    pool: PgPool,
    cache: SnapshotCache,
}

impl CatalogService {
    pub fn new(repo: CatalogRepository, pool: PgPool, ttl: Duration) -> Self {
        let cache = SnapshotCache::new(Arc::new(repo.clone()), ttl);
        Self { repo, pool, cache }
    }

    pub async fn snapshot(&self) -> Result<Arc<CatalogSnapshot>, AppError> {
        self.cache.current().await
    }

    pub async fn reload(&self) -> Result<CatalogStats, AppError> {
        Ok(self.cache.reload().await?.graph.stats())
    }

    // --- Leitura ---

    pub async fn search(&self, query: &str) -> Result<CatalogTree, AppError> {
        let snapshot = self.snapshot().await?;
        Ok(filter_catalog(&snapshot.graph, query, None))
    }

    pub async fn material_relacoes(&self, material_id: Uuid) -> Result<MaterialRelacoes, AppError> {
        let snapshot = self.snapshot().await?;
        material_relacoes(&snapshot.graph, material_id).ok_or(AppError::MaterialNotFound(material_id))
    }

    pub async fn grupo_relacoes(&self, grupo_id: Uuid) -> Result<GrupoRelacoes, AppError> {
        let snapshot = self.snapshot().await?;
        grupo_relacoes(&snapshot.graph, grupo_id).ok_or(AppError::GrupoNotFound(grupo_id))
    }

    pub async fn list_fases(&self) -> Result<Vec<Fase>, AppError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.graph.phases().cloned().collect())
    }

    pub async fn list_servicos(&self) -> Result<Vec<ServicoDetalhe>, AppError> {
        let snapshot = self.snapshot().await?;
        let mut servicos: Vec<ServicoDetalhe> = snapshot
            .rows
            .servicos
            .iter()
            .map(|servico| ServicoDetalhe {
                servico: servico.clone(),
                fase_ids: dedup_ids(&snapshot.rows.fase_ids_of_servico(servico.id)),
                grupos_insumo_ids: dedup_ids(&snapshot.rows.grupo_ids_of_servico(servico.id)),
            })
            .collect();
        servicos.sort_by(|a, b| (a.servico.ordem, &a.servico.nome).cmp(&(b.servico.ordem, &b.servico.nome)));
        Ok(servicos)
    }

    pub async fn list_grupos(&self) -> Result<Vec<GrupoInsumo>, AppError> {
        let snapshot = self.snapshot().await?;
        let mut grupos = snapshot.rows.grupos.clone();
        grupos.sort_by(|a, b| a.nome.cmp(&b.nome));
        Ok(grupos)
    }

    pub async fn list_materiais(&self) -> Result<Vec<MaterialDetalhe>, AppError> {
        let snapshot = self.snapshot().await?;
        let mut materiais: Vec<MaterialDetalhe> = snapshot
            .rows
            .materiais
            .iter()
            .map(|material| MaterialDetalhe {
                material: material.clone(),
                grupos_insumo_ids: dedup_ids(&snapshot.rows.grupo_ids_of_material(material.id)),
            })
            .collect();
        materiais.sort_by(|a, b| a.material.nome.cmp(&b.material.nome));
        Ok(materiais)
    }

    // --- Escrita (banco primeiro, depois a cópia em memória) ---

    pub async fn upsert_fase(&self, id: Uuid, cronologia: i32, nome: &str) -> Result<Fase, AppError> {
        let fase = self.repo.upsert_fase(&self.pool, id, cronologia, nome.trim()).await?;

        let local = fase.clone();
        self.cache.apply(move |rows| rows.upsert_fase(local)).await;
        Ok(fase)
    }

    /// Reatribui as cronologias (1..n) na ordem recebida, numa transação só.
    pub async fn reorder_fases(&self, ordem: &[Uuid]) -> Result<Vec<Fase>, AppError> {
        let mut tx = self.pool.begin().await?;

        let existentes = self.repo.list_fase_ids(&mut *tx).await?;
        validate_phase_order(&existentes, ordem)?;

        self.repo.defer_cronologia_check(&mut *tx).await?;
        for (posicao, id) in ordem.iter().enumerate() {
            self.repo.set_cronologia(&mut *tx, *id, posicao as i32 + 1).await?;
        }

        tx.commit().await?;

        self.cache.apply(|rows| rows.reorder_fases(ordem)).await;
        self.list_fases().await
    }

    pub async fn upsert_servico(
        &self,
        id: Uuid,
        nome: &str,
        ordem: i32,
        descricao: Option<&str>,
        fase_ids: &[Uuid],
        grupo_ids: &[Uuid],
    ) -> Result<ServicoDetalhe, AppError> {
        let fase_ids = dedup_ids(fase_ids);
        let grupo_ids = dedup_ids(grupo_ids);

        let mut tx = self.pool.begin().await?;
        let servico = self.repo.upsert_servico(&mut *tx, id, nome.trim(), ordem, descricao).await?;
        self.repo.replace_servico_fases(&mut tx, id, &fase_ids).await?;
        self.repo.replace_servico_grupos(&mut tx, id, &grupo_ids).await?;
        tx.commit().await?;

        let local = servico.clone();
        self.cache
            .apply(|rows| rows.upsert_servico(local, &fase_ids, &grupo_ids))
            .await;

        Ok(ServicoDetalhe { servico, fase_ids, grupos_insumo_ids: grupo_ids })
    }

    pub async fn upsert_grupo(&self, id: Uuid, nome: &str, descricao: Option<&str>) -> Result<GrupoInsumo, AppError> {
        let grupo = self.repo.upsert_grupo(&self.pool, id, nome.trim(), descricao).await?;

        let local = grupo.clone();
        self.cache.apply(move |rows| rows.upsert_grupo(local)).await;
        Ok(grupo)
    }

    pub async fn upsert_material(
        &self,
        id: Uuid,
        nome: &str,
        unidade: &str,
        descricao: Option<&str>,
        grupo_ids: &[Uuid],
    ) -> Result<MaterialDetalhe, AppError> {
        let grupo_ids = dedup_ids(grupo_ids);

        let mut tx = self.pool.begin().await?;
        let material = self
            .repo
            .upsert_material(&mut *tx, id, nome.trim(), unidade.trim(), descricao)
            .await?;
        self.repo.replace_material_grupos(&mut tx, id, &grupo_ids).await?;
        tx.commit().await?;

        let local = material.clone();
        self.cache.apply(|rows| rows.upsert_material(local, &grupo_ids)).await;

        Ok(MaterialDetalhe { material, grupos_insumo_ids: grupo_ids })
    }

    /// Delete idempotente: apagar o que já não existe não é erro.
    pub async fn delete(&self, kind: CatalogTable, id: Uuid) -> Result<(), AppError> {
        let removed = self.repo.delete(&self.pool, kind, id).await?;
        if !removed {
            tracing::debug!("{:?} {} já não existia", kind, id);
        }

        self.cache
            .apply(|rows| {
                match kind {
                    CatalogTable::Fases => rows.remove_fase(id),
                    CatalogTable::Servicos => rows.remove_servico(id),
                    CatalogTable::Grupos => rows.remove_grupo(id),
                    CatalogTable::Materiais => rows.remove_material(id),
                };
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog_graph::tests::{fase, grupo, material, servico};
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    };

    // Origem em memória: conta as cargas e pode ser forçada a falhar
    #[derive(Default)]
    struct FakeSource {
        rows: Mutex<CatalogRows>,
        loads: AtomicUsize,
        fail_materiais: AtomicBool,
    }

    impl FakeSource {
        fn with(rows: CatalogRows) -> Arc<Self> {
            Arc::new(Self { rows: Mutex::new(rows), ..Default::default() })
        }

        fn rows(&self) -> CatalogRows {
            self.rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CatalogSource for FakeSource {
        async fn fases(&self) -> Result<Vec<Fase>, AppError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows().fases)
        }
        async fn servicos(&self) -> Result<Vec<Servico>, AppError> {
            Ok(self.rows().servicos)
        }
        async fn grupos(&self) -> Result<Vec<GrupoInsumo>, AppError> {
            Ok(self.rows().grupos)
        }
        async fn materiais(&self) -> Result<Vec<Material>, AppError> {
            if self.fail_materiais.load(Ordering::SeqCst) {
                return Err(AppError::InternalServerError(anyhow::anyhow!("conexão caiu")));
            }
            Ok(self.rows().materiais)
        }
        async fn servico_fase(&self) -> Result<Vec<ServicoFase>, AppError> {
            Ok(self.rows().servico_fase)
        }
        async fn servico_grupo(&self) -> Result<Vec<ServicoGrupo>, AppError> {
            Ok(self.rows().servico_grupo)
        }
        async fn material_grupo(&self) -> Result<Vec<MaterialGrupo>, AppError> {
            Ok(self.rows().material_grupo)
        }
    }

    struct Seed {
        rows: CatalogRows,
        fundacao: Fase,
        cimento: GrupoInsumo,
        cp2: Material,
    }

    fn seed() -> Seed {
        let fundacao = fase(1, "Fundação");
        let cobertura = fase(2, "Cobertura");
        let sapatas = servico(1, "Sapatas");
        let cimento = grupo("Cimento");
        let cp2 = material("Cimento CP-II", "saco");

        let mut rows = CatalogRows {
            fases: vec![fundacao.clone(), cobertura],
            ..Default::default()
        };
        rows.upsert_grupo(cimento.clone());
        rows.upsert_servico(sapatas, &[fundacao.id], &[cimento.id]);
        rows.upsert_material(cp2.clone(), &[cimento.id]);

        Seed { rows, fundacao, cimento, cp2 }
    }

    #[tokio::test]
    async fn load_joins_every_table() {
        let s = seed();
        let source = FakeSource::with(s.rows.clone());

        let rows = load_rows(source.as_ref()).await.unwrap();
        let graph = CatalogGraph::build(&rows);

        assert_eq!(graph.stats(), CatalogStats { fases: 2, servicos: 1, grupos: 1, materiais: 1 });
        assert_eq!(graph.phases_by_material(s.cp2.id)[0].id, s.fundacao.id);
    }

    #[tokio::test]
    async fn any_failed_read_makes_the_catalog_unavailable() {
        let source = FakeSource::with(seed().rows);
        source.fail_materiais.store(true, Ordering::SeqCst);

        let err = load_rows(source.as_ref()).await.unwrap_err();
        assert!(matches!(err, AppError::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn empty_phase_table_is_unavailable() {
        let source = FakeSource::with(CatalogRows::default());
        let err = load_rows(source.as_ref()).await.unwrap_err();
        assert!(matches!(err, AppError::DataUnavailable(_)));
    }

    #[tokio::test]
    async fn snapshot_is_reused_within_ttl() {
        let source = FakeSource::with(seed().rows);
        let cache = SnapshotCache::new(source.clone(), Duration::from_secs(60));

        let a = cache.current().await.unwrap();
        let b = cache.current().await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_snapshot_is_reloaded() {
        let source = FakeSource::with(seed().rows);
        let cache = SnapshotCache::new(source.clone(), Duration::ZERO);

        cache.current().await.unwrap();
        cache.current().await.unwrap();

        assert_eq!(source.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_snapshot() {
        let source = FakeSource::with(seed().rows);
        let cache = SnapshotCache::new(source.clone(), Duration::from_secs(60));
        let before = cache.current().await.unwrap();

        source.fail_materiais.store(true, Ordering::SeqCst);
        assert!(cache.reload().await.is_err());

        let after = cache.current().await.unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn local_write_rebuilds_graph_without_reloading() {
        let s = seed();
        let source = FakeSource::with(s.rows.clone());
        let cache = SnapshotCache::new(source.clone(), Duration::from_secs(60));
        cache.current().await.unwrap();

        // Cenário D: apagar o grupo solta o material, mas não o apaga
        cache.apply(|rows| {
            rows.remove_grupo(s.cimento.id);
        })
        .await;

        let snapshot = cache.current().await.unwrap();
        assert!(snapshot.graph.material(s.cp2.id).is_some());
        assert!(snapshot.graph.phases_by_material(s.cp2.id).is_empty());
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn apply_without_snapshot_is_a_no_op() {
        let source = FakeSource::with(seed().rows);
        let cache = SnapshotCache::new(source.clone(), Duration::from_secs(60));

        cache.apply(|rows| rows.upsert_grupo(grupo("Areia"))).await;

        // A primeira leitura vem do banco, sem o grupo aplicado às cegas
        let snapshot = cache.current().await.unwrap();
        assert_eq!(snapshot.graph.stats().grupos, 1);
    }

    #[test]
    fn relations_of_a_material_walk_both_hops() {
        let s = seed();
        let graph = CatalogGraph::build(&s.rows);

        let rel = material_relacoes(&graph, s.cp2.id).unwrap();
        assert_eq!(rel.grupos, vec![s.cimento.clone()]);
        assert_eq!(rel.servicos.len(), 1);
        assert_eq!(rel.fases, vec![s.fundacao.clone()]);

        assert!(material_relacoes(&graph, Uuid::new_v4()).is_none());
    }

    #[test]
    fn relations_of_a_group() {
        let s = seed();
        let graph = CatalogGraph::build(&s.rows);

        let rel = grupo_relacoes(&graph, s.cimento.id).unwrap();
        assert_eq!(rel.materiais, vec![s.cp2.clone()]);
        assert_eq!(rel.fases, vec![s.fundacao.clone()]);
    }

    #[test]
    fn phase_order_must_be_a_permutation() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let existentes = [a, b, c];

        assert!(validate_phase_order(&existentes, &[c, a, b]).is_ok());
        assert!(matches!(validate_phase_order(&existentes, &[a, b]), Err(AppError::InvalidPhaseOrder)));
        assert!(matches!(validate_phase_order(&existentes, &[a, a, b, c]), Err(AppError::InvalidPhaseOrder)));
        assert!(matches!(
            validate_phase_order(&existentes, &[a, b, Uuid::new_v4()]),
            Err(AppError::InvalidPhaseOrder)
        ));
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(dedup_ids(&[b, a, b, a]), vec![b, a]);
    }
}
