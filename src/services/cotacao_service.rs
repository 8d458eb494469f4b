// src/services/cotacao_service.rs

use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::{
    common::error::AppError,
    db::{CotacaoRepository, ObraRepository},
    models::{
        auth::{User, UserRole},
        catalog::ValidationWarning,
        cotacao::{Cotacao, CotacaoDetalhe, CotacaoStatus, NovoCotacaoItem},
        obra::Obra,
    },
    services::{
        catalog_filter::validate_material_fase, catalog_graph::CatalogGraph,
        catalog_service::CatalogService, obra_service::ensure_obra_access,
    },
};

// Linha do carrinho como o cliente envia. Contexto (grupo/serviço/fase) é opcional:
// sem ele, o item é ancorado no primeiro caminho do catálogo.
#[derive(Debug, Clone, PartialEq)]
pub struct CarrinhoItem {
    pub material_id: Uuid,
    pub quantidade: Decimal,
    pub grupo_id: Option<Uuid>,
    pub servico_id: Option<Uuid>,
    pub fase_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NovaCotacao<'a> {
    // Gerado pelo cliente: reenviar o mesmo carrinho não cria outra cotação
    pub id: Uuid,
    pub obra_id: Uuid,
    pub itens: &'a [CarrinhoItem],
    pub observacoes: Option<&'a str>,
    pub confirmar_fora_de_fase: bool,
}

// =============================================================================
//  RESOLUÇÃO DO CARRINHO (puro, sobre o grafo)
// =============================================================================

fn item_error(code: &'static str, message: String) -> AppError {
    let mut errors = ValidationErrors::new();
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    errors.add("itens", err);
    AppError::ValidationError(errors)
}

// Maior valor que cabe em cotacao_itens.quantidade NUMERIC(14,3)
fn quantidade_maxima() -> Decimal {
    Decimal::new(99_999_999_999_999, 3)
}

fn quantidade_excedida(posicao: usize) -> AppError {
    item_error(
        "range",
        format!("Item {}: a quantidade excede o máximo de {}.", posicao + 1, quantidade_maxima()),
    )
}

fn resolve_item(graph: &CatalogGraph, posicao: usize, item: &CarrinhoItem) -> Result<NovoCotacaoItem, AppError> {
    if item.quantidade <= Decimal::ZERO {
        return Err(item_error("range", format!("Item {}: a quantidade deve ser maior que zero.", posicao + 1)));
    }
    if item.quantidade > quantidade_maxima() {
        return Err(quantidade_excedida(posicao));
    }

    let material = graph
        .material(item.material_id)
        .ok_or(AppError::MaterialNotFound(item.material_id))?;

    // Grupo: o informado precisa conter o material
    let grupos = graph.groups_by_material(material.id);
    let grupo_id = match item.grupo_id {
        Some(id) if grupos.iter().any(|g| g.id == id) => Some(id),
        Some(_) => return Err(AppError::InvalidReference(format!("itens[{}].grupoId", posicao))),
        None => grupos.first().map(|g| g.id),
    };

    // Serviço: precisa usar o grupo escolhido
    let servicos = match grupo_id {
        Some(grupo_id) => graph.services_by_group(grupo_id),
        None => Vec::new(),
    };
    let servico_id = match item.servico_id {
        Some(id) if servicos.iter().any(|s| s.id == id) => Some(id),
        Some(_) => return Err(AppError::InvalidReference(format!("itens[{}].servicoId", posicao))),
        None => servicos.first().map(|s| s.id),
    };

    // Fase: precisa conter o serviço; sem serviço, a fase mais antiga do material
    let fases = match servico_id {
        Some(servico_id) => graph.phases_by_service(servico_id),
        None => graph.phases_by_material(material.id),
    };
    let fase_id = match item.fase_id {
        Some(id) if fases.iter().any(|f| f.id == id) => Some(id),
        Some(_) => return Err(AppError::InvalidReference(format!("itens[{}].faseId", posicao))),
        None => fases.first().map(|f| f.id),
    };

    Ok(NovoCotacaoItem {
        material_id: material.id,
        nome: material.nome.clone(),
        unidade: material.unidade.clone(),
        grupo_id,
        quantidade: item.quantidade,
        fase_id,
        servico_id,
    })
}

/// Valida o carrinho contra o catálogo e copia nome/unidade de cada material.
/// O mesmo material no mesmo contexto vira uma linha só, com as quantidades somadas.
pub fn resolve_itens(graph: &CatalogGraph, itens: &[CarrinhoItem]) -> Result<Vec<NovoCotacaoItem>, AppError> {
    if itens.is_empty() {
        return Err(AppError::EmptyCotacao);
    }

    let mut resolvidos: Vec<NovoCotacaoItem> = Vec::with_capacity(itens.len());
    let mut posicao_por_chave: HashMap<(Uuid, Option<Uuid>, Option<Uuid>, Option<Uuid>), usize> = HashMap::new();

    for (posicao, item) in itens.iter().enumerate() {
        let novo = resolve_item(graph, posicao, item)?;
        let chave = (novo.material_id, novo.grupo_id, novo.servico_id, novo.fase_id);

        match posicao_por_chave.get(&chave) {
            Some(&existente) => {
                let somada = resolvidos[existente]
                    .quantidade
                    .checked_add(novo.quantidade)
                    .filter(|q| *q <= quantidade_maxima())
                    .ok_or_else(|| quantidade_excedida(posicao))?;
                resolvidos[existente].quantidade = somada;
            }
            None => {
                posicao_por_chave.insert(chave, resolvidos.len());
                resolvidos.push(novo);
            }
        }
    }

    Ok(resolvidos)
}

/// Um aviso por material fora da etapa atual da obra.
pub fn collect_warnings(graph: &CatalogGraph, obra: &Obra, itens: &[NovoCotacaoItem]) -> Vec<ValidationWarning> {
    let mut vistos = HashSet::new();
    itens
        .iter()
        .filter(|item| vistos.insert(item.material_id))
        .filter_map(|item| validate_material_fase(graph, item.material_id, obra))
        .collect()
}

// =============================================================================
//  SERVIÇO
// =============================================================================

#[derive(Clone)]
pub struct CotacaoService {
    repo: CotacaoRepository,
    obra_repo: ObraRepository,
    catalog: CatalogService,
    pool: PgPool,
}

impl CotacaoService {
    pub fn new(
        repo: CotacaoRepository,
        obra_repo: ObraRepository,
        catalog: CatalogService,
        pool: PgPool,
    ) -> Self {
        Self { repo, obra_repo, catalog, pool }
    }

    async fn obra_do_usuario(&self, user: &User, obra_id: Uuid) -> Result<Obra, AppError> {
        let obra = self
            .obra_repo
            .find_obra(&self.pool, obra_id)
            .await?
            .ok_or(AppError::ObraNotFound)?;
        ensure_obra_access(user, &obra)?;
        Ok(obra)
    }

    /// Envia o carrinho. Devolve a cotação e `true` se ela acabou de ser criada
    /// (`false` quando o mesmo id já tinha sido gravado).
    pub async fn submit(&self, user: &User, nova: &NovaCotacao<'_>) -> Result<(CotacaoDetalhe, bool), AppError> {
        // Reenvio: nada a validar, devolve o que já está gravado
        if let Some(existente) = self.repo.find_cotacao(&self.pool, nova.id).await? {
            return Ok((self.detalhe_de(user, existente).await?, false));
        }

        let obra = self.obra_do_usuario(user, nova.obra_id).await?;
        let snapshot = self.catalog.snapshot().await?;

        let itens = resolve_itens(&snapshot.graph, nova.itens)?;
        let warnings = collect_warnings(&snapshot.graph, &obra, &itens);
        if !warnings.is_empty() && !nova.confirmar_fora_de_fase {
            return Err(AppError::OutOfPhaseConfirmationRequired(warnings));
        }

        let mut tx = self.pool.begin().await?;

        let cotacao = match self
            .repo
            .insert_cotacao(&mut *tx, nova.id, obra.id, user.id, nova.observacoes)
            .await?
        {
            Some(cotacao) => cotacao,
            None => {
                // Outro envio com o mesmo id venceu a corrida
                tx.rollback().await?;
                let existente = self
                    .repo
                    .find_cotacao(&self.pool, nova.id)
                    .await?
                    .ok_or(AppError::CotacaoNotFound)?;
                return Ok((self.detalhe_de(user, existente).await?, false));
            }
        };

        let mut gravados = Vec::with_capacity(itens.len());
        for item in &itens {
            gravados.push(self.repo.insert_item(&mut *tx, cotacao.id, item).await?);
        }

        tx.commit().await?;

        tracing::info!(
            "🧾 Cotação {} enviada para a obra {} com {} itens ({} avisos confirmados)",
            cotacao.id,
            obra.id,
            gravados.len(),
            warnings.len()
        );

        Ok((
            CotacaoDetalhe { header: cotacao, obra_nome: obra.nome, itens: gravados },
            true,
        ))
    }

    /// Cliente vê as suas; admin vê todas.
    pub async fn list(&self, user: &User, obra_id: Option<Uuid>) -> Result<Vec<Cotacao>, AppError> {
        if let Some(obra_id) = obra_id {
            self.obra_do_usuario(user, obra_id).await?;
        }
        let cliente = (user.role != UserRole::Admin).then_some(user.id);
        self.repo.list_cotacoes(&self.pool, cliente, obra_id).await
    }

    pub async fn detalhe(&self, user: &User, cotacao_id: Uuid) -> Result<CotacaoDetalhe, AppError> {
        let cotacao = self
            .repo
            .find_cotacao(&self.pool, cotacao_id)
            .await?
            .ok_or(AppError::CotacaoNotFound)?;
        self.detalhe_de(user, cotacao).await
    }

    // Dono, admin ou fornecedor que atende algum grupo dos itens
    async fn detalhe_de(&self, user: &User, cotacao: Cotacao) -> Result<CotacaoDetalhe, AppError> {
        let permitido = match user.role {
            UserRole::Admin => true,
            UserRole::Cliente => cotacao.cliente_id == user.id,
            UserRole::Fornecedor => {
                self.repo
                    .visible_to_fornecedor(&self.pool, user.id, cotacao.id)
                    .await?
            }
        };
        if !permitido {
            return Err(AppError::CotacaoNotFound);
        }

        let obra_nome = self
            .obra_repo
            .find_obra(&self.pool, cotacao.obra_id)
            .await?
            .map(|obra| obra.nome)
            .unwrap_or_default();
        let itens = self.repo.list_itens(&self.pool, cotacao.id).await?;

        Ok(CotacaoDetalhe { header: cotacao, obra_nome, itens })
    }

    pub async fn cancelar(&self, user: &User, cotacao_id: Uuid) -> Result<Cotacao, AppError> {
        let mut tx = self.pool.begin().await?;

        let cotacao = self
            .repo
            .find_cotacao(&mut *tx, cotacao_id)
            .await?
            .ok_or(AppError::CotacaoNotFound)?;
        if user.role != UserRole::Admin && cotacao.cliente_id != user.id {
            return Err(AppError::CotacaoNotFound);
        }

        let cancelada = self
            .repo
            .close_if_open(&mut *tx, cotacao_id, CotacaoStatus::Cancelada)
            .await?
            .ok_or(AppError::CotacaoNotOpen)?;

        tx.commit().await?;
        tracing::info!("🚫 Cotação {} cancelada por {}", cotacao_id, user.id);
        Ok(cancelada)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::{Fase, GrupoInsumo, Material, Servico, WarningKind};
    use crate::services::catalog_graph::{
        tests::{fase, grupo, material, servico},
        CatalogRows,
    };
    use crate::services::eligibility::tests::obra;

    struct Catalogo {
        graph: CatalogGraph,
        fundacao: Fase,
        cobertura: Fase,
        sapatas: Servico,
        telhado: Servico,
        cimento: GrupoInsumo,
        telhas: GrupoInsumo,
        cp2: Material,
        telha: Material,
        avulso: Material,
    }

    fn catalogo() -> Catalogo {
        let fundacao = fase(1, "Fundação");
        let cobertura = fase(2, "Cobertura");
        let sapatas = servico(1, "Sapatas");
        let telhado = servico(1, "Telhado");
        let cimento = grupo("Cimento");
        let telhas = grupo("Telhas");
        let cp2 = material("Cimento CP-II", "saco");
        let telha = material("Telha cerâmica", "un");
        let avulso = material("Lona plástica", "m²");

        let mut rows = CatalogRows {
            fases: vec![fundacao.clone(), cobertura.clone()],
            grupos: vec![cimento.clone(), telhas.clone()],
            ..Default::default()
        };
        rows.upsert_servico(sapatas.clone(), &[fundacao.id], &[cimento.id]);
        // O cimento também é usado no telhado (argamassa de assentamento)
        rows.upsert_servico(telhado.clone(), &[cobertura.id], &[telhas.id, cimento.id]);
        rows.upsert_material(cp2.clone(), &[cimento.id]);
        rows.upsert_material(telha.clone(), &[telhas.id]);
        rows.upsert_material(avulso.clone(), &[]);

        Catalogo {
            graph: CatalogGraph::build(&rows),
            fundacao,
            cobertura,
            sapatas,
            telhado,
            cimento,
            telhas,
            cp2,
            telha,
            avulso,
        }
    }

    fn item(material_id: Uuid, quantidade: i64) -> CarrinhoItem {
        CarrinhoItem {
            material_id,
            quantidade: Decimal::from(quantidade),
            grupo_id: None,
            servico_id: None,
            fase_id: None,
        }
    }

    #[test]
    fn empty_cart_is_rejected() {
        let c = catalogo();
        assert!(matches!(resolve_itens(&c.graph, &[]), Err(AppError::EmptyCotacao)));
    }

    #[test]
    fn item_without_context_is_anchored_on_first_path() {
        let c = catalogo();
        let itens = resolve_itens(&c.graph, &[item(c.cp2.id, 10)]).unwrap();

        assert_eq!(itens.len(), 1);
        assert_eq!(itens[0].nome, "Cimento CP-II");
        assert_eq!(itens[0].unidade, "saco");
        assert_eq!(itens[0].grupo_id, Some(c.cimento.id));
        // "Sapatas" vem antes de "Telhado" (mesma ordem, nome desempata)
        assert_eq!(itens[0].servico_id, Some(c.sapatas.id));
        assert_eq!(itens[0].fase_id, Some(c.fundacao.id));
    }

    #[test]
    fn explicit_context_is_kept_when_consistent() {
        let c = catalogo();
        let mut pedido = item(c.cp2.id, 5);
        pedido.servico_id = Some(c.telhado.id);

        let itens = resolve_itens(&c.graph, &[pedido]).unwrap();
        assert_eq!(itens[0].servico_id, Some(c.telhado.id));
        assert_eq!(itens[0].fase_id, Some(c.cobertura.id));
    }

    #[test]
    fn inconsistent_context_is_an_invalid_reference() {
        let c = catalogo();
        let mut pedido = item(c.cp2.id, 5);
        pedido.grupo_id = Some(c.telhas.id);

        assert!(matches!(
            resolve_itens(&c.graph, &[pedido]),
            Err(AppError::InvalidReference(campo)) if campo == "itens[0].grupoId"
        ));
    }

    #[test]
    fn unknown_material_and_bad_quantity_are_rejected() {
        let c = catalogo();
        let fantasma = Uuid::new_v4();
        assert!(matches!(
            resolve_itens(&c.graph, &[item(fantasma, 1)]),
            Err(AppError::MaterialNotFound(id)) if id == fantasma
        ));
        assert!(matches!(
            resolve_itens(&c.graph, &[item(c.cp2.id, 0)]),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn repeated_material_in_same_context_is_merged() {
        let c = catalogo();
        let itens = resolve_itens(&c.graph, &[item(c.cp2.id, 10), item(c.telha.id, 100), item(c.cp2.id, 5)]).unwrap();

        assert_eq!(itens.len(), 2);
        assert_eq!(itens[0].quantidade, Decimal::from(15));
    }

    #[test]
    fn quantity_above_column_limit_is_rejected() {
        let c = catalogo();
        let mut enorme = item(c.cp2.id, 1);
        enorme.quantidade = Decimal::MAX;
        assert!(matches!(
            resolve_itens(&c.graph, &[enorme]),
            Err(AppError::ValidationError(e)) if e.field_errors().contains_key("itens")
        ));

        let mut limite = item(c.cp2.id, 1);
        limite.quantidade = Decimal::new(99_999_999_999_999, 3);
        let itens = resolve_itens(&c.graph, &[limite]).unwrap();
        assert_eq!(itens[0].quantidade, Decimal::new(99_999_999_999_999, 3));
    }

    #[test]
    fn merged_quantity_above_column_limit_is_rejected() {
        let c = catalogo();
        // Cada linha cabe sozinha; a soma não
        let metade = item(c.cp2.id, 60_000_000_000);
        assert!(matches!(
            resolve_itens(&c.graph, &[metade.clone(), metade]),
            Err(AppError::ValidationError(e)) if e.field_errors().contains_key("itens")
        ));
    }

    #[test]
    fn material_without_links_keeps_empty_context() {
        let c = catalogo();
        let itens = resolve_itens(&c.graph, &[item(c.avulso.id, 3)]).unwrap();
        assert_eq!(itens[0].grupo_id, None);
        assert_eq!(itens[0].servico_id, None);
        assert_eq!(itens[0].fase_id, None);
    }

    #[test]
    fn warnings_name_each_out_of_phase_material_once() {
        let c = catalogo();
        let obra = obra(Some("Fundação"), None, vec![]);
        let itens = resolve_itens(
            &c.graph,
            &[item(c.cp2.id, 1), item(c.telha.id, 1), item(c.avulso.id, 1)],
        )
        .unwrap();

        let warnings = collect_warnings(&c.graph, &obra, &itens);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].kind, WarningKind::MaterialForaDaFase);
        assert_eq!(warnings[0].material_id, c.telha.id);
        assert_eq!(warnings[0].fase_do_material.as_deref(), Some("Cobertura"));
        assert_eq!(warnings[1].kind, WarningKind::MaterialSemFase);
    }

    #[test]
    fn obra_without_current_phase_produces_no_warnings() {
        let c = catalogo();
        let obra = obra(None, None, vec![]);
        let itens = resolve_itens(&c.graph, &[item(c.telha.id, 1)]).unwrap();
        assert!(collect_warnings(&c.graph, &obra, &itens).is_empty());
    }
}
