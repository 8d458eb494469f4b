// src/services/catalog_filter.rs
//
// Busca no catálogo preservando a hierarquia: um nó aparece se o nome dele
// bate com o termo OU se algum descendente bate. Um nó que bate diretamente
// traz a subárvore inteira.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    models::{
        catalog::{
            CatalogStats, CatalogTree, Fase, FaseNode, GrupoInsumo, GrupoNode, Servico, ServicoNode,
            ValidationWarning, WarningKind,
        },
        obra::Obra,
    },
    services::catalog_graph::CatalogGraph,
};

// Minúsculas sem acento: "Fundação" e "fundacao" viram o mesmo texto.
fn fold(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            outro => outro,
        })
        .collect()
}

// Termo normalizado (trim + fold). Vazio casa com tudo.
struct Needle(String);

impl Needle {
    fn new(query: &str) -> Self {
        Self(fold(query.trim()))
    }

    fn matches(&self, text: &str) -> bool {
        self.0.is_empty() || fold(text).contains(&self.0)
    }
}

struct TreeBuilder<'a> {
    graph: &'a CatalogGraph,
    needle: Needle,
    // Materiais que batem por nome, unidade ou nome de um dos seus grupos
    materiais_encontrados: HashSet<Uuid>,
}

impl<'a> TreeBuilder<'a> {
    fn new(graph: &'a CatalogGraph, query: &str) -> Self {
        let needle = Needle::new(query);
        let mut materiais_encontrados = HashSet::new();

        // De baixo para cima: primeiro os materiais
        for fase in graph.phases() {
            for servico in graph.services_by_phase(fase.id) {
                for grupo in graph.groups_by_service(servico.id) {
                    for material in graph.materials_by_group(grupo.id) {
                        if materiais_encontrados.contains(&material.id) {
                            continue;
                        }
                        let bate = needle.matches(&material.nome)
                            || needle.matches(&material.unidade)
                            || graph
                                .groups_by_material(material.id)
                                .iter()
                                .any(|g| needle.matches(&g.nome));
                        if bate {
                            materiais_encontrados.insert(material.id);
                        }
                    }
                }
            }
        }

        Self { graph, needle, materiais_encontrados }
    }

    fn grupo(&self, grupo: &GrupoInsumo, ancestral_bate: bool) -> Option<GrupoNode> {
        let mostra_tudo = ancestral_bate || self.needle.matches(&grupo.nome);
        let materiais: Vec<_> = self
            .graph
            .materials_by_group(grupo.id)
            .into_iter()
            .filter(|m| mostra_tudo || self.materiais_encontrados.contains(&m.id))
            .cloned()
            .collect();

        (mostra_tudo || !materiais.is_empty()).then(|| GrupoNode { grupo: grupo.clone(), materiais })
    }

    fn servico(&self, servico: &Servico, ancestral_bate: bool) -> Option<ServicoNode> {
        let mostra_tudo = ancestral_bate || self.needle.matches(&servico.nome);
        let grupos: Vec<_> = self
            .graph
            .groups_by_service(servico.id)
            .into_iter()
            .filter_map(|g| self.grupo(g, mostra_tudo))
            .collect();

        (mostra_tudo || !grupos.is_empty()).then(|| ServicoNode { servico: servico.clone(), grupos })
    }

    fn fase(&self, fase: &Fase) -> Option<FaseNode> {
        let mostra_tudo = self.needle.matches(&fase.nome);
        let servicos: Vec<_> = self
            .graph
            .services_by_phase(fase.id)
            .into_iter()
            .filter_map(|s| self.servico(s, mostra_tudo))
            .collect();

        (mostra_tudo || !servicos.is_empty()).then(|| FaseNode { fase: fase.clone(), servicos })
    }
}

/// Filtra o catálogo pelo termo `query` (sem diferenciar maiúsculas).
///
/// Com `allowed_phases`, só as fases do conjunto são consideradas (a interseção
/// com a elegibilidade da obra); dentro de uma fase permitida tudo é alcançável.
pub fn filter_catalog(
    graph: &CatalogGraph,
    query: &str,
    allowed_phases: Option<&HashSet<Uuid>>,
) -> CatalogTree {
    let builder = TreeBuilder::new(graph, query);

    let fases: Vec<FaseNode> = graph
        .phases()
        .filter(|fase| allowed_phases.is_none_or(|allowed| allowed.contains(&fase.id)))
        .filter_map(|fase| builder.fase(fase))
        .collect();

    let totais = tree_stats(&fases);
    CatalogTree { fases, totais }
}

// Conta ids distintos: o mesmo material sob dois grupos conta uma vez.
fn tree_stats(fases: &[FaseNode]) -> CatalogStats {
    let mut servicos = HashSet::new();
    let mut grupos = HashSet::new();
    let mut materiais = HashSet::new();

    for fase in fases {
        for servico in &fase.servicos {
            servicos.insert(servico.servico.id);
            for grupo in &servico.grupos {
                grupos.insert(grupo.grupo.id);
                materiais.extend(grupo.materiais.iter().map(|m| m.id));
            }
        }
    }

    CatalogStats {
        fases: fases.len(),
        servicos: servicos.len(),
        grupos: grupos.len(),
        materiais: materiais.len(),
    }
}

/// Confere se a fase mais antiga do material (menor cronologia) é a etapa
/// atual da obra. Só avisa; quem decide é o comprador.
pub fn validate_material_fase(
    graph: &CatalogGraph,
    material_id: Uuid,
    obra: &Obra,
) -> Option<ValidationWarning> {
    let etapa_atual = obra.etapa.as_deref().map(str::trim).filter(|e| !e.is_empty())?;
    let material = graph.material(material_id)?;

    let kind_and_fase = match graph.earliest_phase_of_material(material_id) {
        Some(fase) if fase.nome.trim() == etapa_atual => return None,
        Some(fase) => (WarningKind::MaterialForaDaFase, Some(fase.nome.clone())),
        None => (WarningKind::MaterialSemFase, None),
    };

    Some(ValidationWarning {
        kind: kind_and_fase.0,
        material_id,
        material_nome: material.nome.clone(),
        fase_do_material: kind_and_fase.1,
        etapa_atual: etapa_atual.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog_graph::{
        tests::{fase, grupo, material, servico},
        CatalogRows,
    };
    use crate::services::eligibility::tests::obra;
    use crate::models::catalog::Material;
    use rstest::rstest;

    struct Catalogo {
        graph: CatalogGraph,
        fundacao: Fase,
        cobertura: Fase,
        sapatas: Servico,
        telhado: Servico,
        cimento: GrupoInsumo,
        telhas: GrupoInsumo,
        cp2: Material,
        areia: Material,
        telha: Material,
    }

    fn catalogo() -> Catalogo {
        let fundacao = fase(1, "Fundação");
        let cobertura = fase(5, "Cobertura");
        let sapatas = servico(1, "Sapatas");
        let telhado = servico(1, "Telhado");
        let cimento = grupo("Cimento e argamassa");
        let telhas = grupo("Telhas");
        let cp2 = material("Cimento CP-II", "saco");
        let areia = material("Areia média", "m³");
        let telha = material("Telha cerâmica", "milheiro");

        let mut rows = CatalogRows {
            fases: vec![fundacao.clone(), cobertura.clone()],
            grupos: vec![cimento.clone(), telhas.clone()],
            ..Default::default()
        };
        rows.upsert_servico(sapatas.clone(), &[fundacao.id], &[cimento.id]);
        rows.upsert_servico(telhado.clone(), &[cobertura.id], &[telhas.id, cimento.id]);
        rows.upsert_material(cp2.clone(), &[cimento.id]);
        rows.upsert_material(areia.clone(), &[cimento.id]);
        rows.upsert_material(telha.clone(), &[telhas.id]);

        Catalogo {
            graph: CatalogGraph::build(&rows),
            fundacao,
            cobertura,
            sapatas,
            telhado,
            cimento,
            telhas,
            cp2,
            areia,
            telha,
        }
    }

    #[test]
    fn empty_query_returns_everything() {
        let c = catalogo();
        let tree = filter_catalog(&c.graph, "   ", None);

        assert_eq!(tree.fases.len(), 2);
        assert_eq!(tree.totais, CatalogStats { fases: 2, servicos: 2, grupos: 2, materiais: 3 });
    }

    // termo que só bate no material traz fase, serviço e grupo ancestrais
    #[test]
    fn leaf_match_keeps_its_ancestors() {
        let c = catalogo();
        let tree = filter_catalog(&c.graph, "TELHA CER", None);

        assert_eq!(tree.fases.len(), 1);
        let fase = &tree.fases[0];
        assert_eq!(fase.fase.id, c.cobertura.id);
        assert_eq!(fase.servicos.len(), 1);
        assert_eq!(fase.servicos[0].servico.id, c.telhado.id);
        assert_eq!(fase.servicos[0].grupos.len(), 1);
        assert_eq!(fase.servicos[0].grupos[0].grupo.id, c.telhas.id);
        assert_eq!(fase.servicos[0].grupos[0].materiais, vec![c.telha.clone()]);
    }

    #[test]
    fn material_matches_by_unit_and_group_name() {
        let c = catalogo();

        let por_unidade = filter_catalog(&c.graph, "m³", None);
        let ids: HashSet<Uuid> = por_unidade
            .fases
            .iter()
            .flat_map(|f| &f.servicos)
            .flat_map(|s| &s.grupos)
            .flat_map(|g| &g.materiais)
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, HashSet::from([c.areia.id]));

        // "argamassa" é nome de grupo: o grupo traz todos os seus materiais
        let por_grupo = filter_catalog(&c.graph, "argamassa", None);
        assert_eq!(por_grupo.totais.materiais, 2);
        assert_eq!(por_grupo.totais.fases, 2);
    }

    #[test]
    fn phase_name_match_brings_whole_subtree() {
        let c = catalogo();
        let tree = filter_catalog(&c.graph, "fundação", None);

        assert_eq!(tree.fases.len(), 1);
        assert_eq!(tree.fases[0].servicos[0].servico.id, c.sapatas.id);
        assert_eq!(tree.totais.materiais, 2);
    }

    #[rstest]
    #[case("fundacao")]
    #[case("FUNDAÇÃO")]
    #[case("Fundacão")]
    fn search_ignores_accents_and_case(#[case] termo: &str) {
        let c = catalogo();
        let tree = filter_catalog(&c.graph, termo, None);

        assert_eq!(tree.fases.len(), 1);
        assert_eq!(tree.fases[0].fase.id, c.fundacao.id);
    }

    #[test]
    fn accented_query_finds_unaccented_text() {
        let c = catalogo();
        // Acento no catálogo e não no termo, e acento trocado no termo
        assert_eq!(filter_catalog(&c.graph, "areia media", None).totais.materiais, 1);
        assert_eq!(filter_catalog(&c.graph, "cerámica", None).totais.materiais, 1);
        assert_eq!(fold("Ação Ñandú m³"), "acao nandu m³");
    }

    #[test]
    fn shared_material_is_counted_once() {
        let c = catalogo();
        // Cimento aparece em Sapatas e em Telhado
        let tree = filter_catalog(&c.graph, "cp-ii", None);
        assert_eq!(tree.totais.fases, 2);
        assert_eq!(tree.totais.grupos, 1);
        assert_eq!(tree.totais.materiais, 1);
    }

    #[test]
    fn allowed_phases_intersect_with_search() {
        let c = catalogo();
        let abertas = HashSet::from([c.fundacao.id]);

        let tudo = filter_catalog(&c.graph, "", Some(&abertas));
        assert_eq!(tudo.fases.len(), 1);
        assert_eq!(tudo.fases[0].fase.id, c.fundacao.id);
        assert_eq!(tudo.totais.materiais, 2);

        let telha = filter_catalog(&c.graph, "telha", Some(&abertas));
        assert!(telha.fases.is_empty());

        let nenhuma = HashSet::new();
        assert!(filter_catalog(&c.graph, "", Some(&nenhuma)).fases.is_empty());
    }

    #[test]
    fn no_match_returns_empty_tree() {
        let c = catalogo();
        let tree = filter_catalog(&c.graph, "porcelanato", None);
        assert!(tree.fases.is_empty());
        assert_eq!(tree.totais, CatalogStats::default());
    }

    #[test]
    fn material_in_current_phase_has_no_warning() {
        let c = catalogo();
        let o = obra(Some("Fundação"), None, vec![]);
        // Cimento chega em Fundação(1) e Cobertura(5): a mais antiga é Fundação
        assert_eq!(validate_material_fase(&c.graph, c.cp2.id, &o), None);
    }

    #[test]
    fn material_from_later_phase_warns() {
        let c = catalogo();
        let o = obra(Some("Fundação"), None, vec![]);

        let aviso = validate_material_fase(&c.graph, c.telha.id, &o).unwrap();
        assert_eq!(aviso.kind, WarningKind::MaterialForaDaFase);
        assert_eq!(aviso.fase_do_material.as_deref(), Some("Cobertura"));
        assert_eq!(aviso.etapa_atual, "Fundação");
    }

    #[test]
    fn material_without_phase_warns_and_obra_without_etapa_does_not() {
        let c = catalogo();
        let solto = material("Prego 17x21", "kg");
        let mut rows = CatalogRows { materiais: vec![solto.clone()], ..Default::default() };
        rows.upsert_grupo(c.cimento.clone());
        let graph = CatalogGraph::build(&rows);

        let o = obra(Some("Fundação"), None, vec![]);
        let aviso = validate_material_fase(&graph, solto.id, &o).unwrap();
        assert_eq!(aviso.kind, WarningKind::MaterialSemFase);

        let sem_etapa = obra(None, None, vec![]);
        assert_eq!(validate_material_fase(&graph, solto.id, &sem_etapa), None);
    }
}
