// src/services/eligibility.rs
//
// Janela de cotação: uma fase recebe ofertas a partir de
// `data_prevista - dias_antecedencia_cotacao` e continua aberta até a etapa
// ser concluída. Toda comparação é por DIA (sem hora), e `today` sempre vem
// de quem chama, já no fuso do negócio.
//
// Datas ausentes ou mal formadas nunca são erro: a fase simplesmente não é
// elegível.

use std::collections::HashSet;

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::{
    models::obra::{FaseElegibilidade, Obra, ObraEtapa, ObraStage},
    services::catalog_graph::CatalogGraph,
};

/// Converte o texto de data do cronograma JSONB em data pura.
/// Aceita `YYYY-MM-DD`, RFC 3339 (a hora é descartada) e `DD/MM/YYYY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| NaiveDate::parse_from_str(raw, "%d/%m/%Y").ok())
}

/// Primeiro dia da janela. Antecedência negativa é tratada como dado inválido.
pub fn window_start(predicted: NaiveDate, advance_days: i32) -> Option<NaiveDate> {
    let days = u64::try_from(advance_days).ok()?;
    predicted.checked_sub_days(Days::new(days))
}

fn stage_window_start(stage: &ObraStage) -> Option<NaiveDate> {
    let predicted = stage.predicted_date.as_deref().and_then(parse_date);
    match (predicted, stage.quotation_advance_days) {
        (Some(predicted), Some(days)) => window_start(predicted, days),
        _ => {
            tracing::debug!(
                "Cronograma com data/antecedência inválida para a fase '{}'; tratada como inelegível",
                stage.name
            );
            None
        }
    }
}

/// Regra por nome de fase, em ordem de prioridade:
/// 1. fase == etapa atual da obra e `inicio_recebimento_oferta` definido:
///    elegível a partir dessa data;
/// 2. entrada homônima em `obra.stages` com data e antecedência: elegível a
///    partir de `data - antecedência`;
/// 3. caso contrário, inelegível.
pub fn is_phase_valid_for_quotation(phase_name: &str, obra: &Obra, today: NaiveDate) -> bool {
    phase_window_start(phase_name, obra).is_some_and(|start| today >= start)
}

/// O início de janela usado pela regra acima, quando existe.
/// Nomes são comparados sem espaços nas pontas, como nos avisos do carrinho.
pub fn phase_window_start(phase_name: &str, obra: &Obra) -> Option<NaiveDate> {
    let phase_name = phase_name.trim();
    if obra.etapa.as_deref().map(str::trim) == Some(phase_name) {
        if let Some(inicio) = obra.inicio_recebimento_oferta {
            return Some(inicio);
        }
    }

    obra.stages
        .iter()
        .find(|stage| stage.name.trim() == phase_name)
        .and_then(stage_window_start)
}

// ---
// Variante por lista (tabela obra_etapas)
// ---

pub fn etapa_window_start(etapa: &ObraEtapa) -> Option<NaiveDate> {
    let predicted = etapa.data_prevista?;
    let days = etapa.dias_antecedencia_cotacao?;
    window_start(predicted, days)
}

/// Etapa válida: tem data prevista, não foi concluída e `today` já entrou na janela.
pub fn is_etapa_valid(etapa: &ObraEtapa, today: NaiveDate) -> bool {
    if etapa.is_completed {
        return false;
    }
    etapa_window_start(etapa).is_some_and(|start| today >= start)
}

pub fn valid_etapas<'a>(etapas: &'a [ObraEtapa], today: NaiveDate) -> Vec<&'a ObraEtapa> {
    etapas.iter().filter(|e| is_etapa_valid(e, today)).collect()
}

// ---
// Conjunto de fases abertas de uma obra
// ---

// A etapa aponta para a fase pelo id; registros antigos só têm o nome.
fn fase_id_of_etapa(graph: &CatalogGraph, etapa: &ObraEtapa) -> Option<Uuid> {
    etapa
        .fase_id
        .filter(|id| graph.fase(*id).is_some())
        .or_else(|| graph.phase_by_name(&etapa.nome).map(|f| f.id))
}

/// Quando a obra tem linhas em `obra_etapas`, elas mandam (e respeitam
/// `is_completed`). Sem etapas cadastradas, vale a regra por nome sobre o
/// cronograma JSONB e a etapa declarada.
pub fn eligible_phase_ids(
    graph: &CatalogGraph,
    obra: &Obra,
    etapas: &[ObraEtapa],
    today: NaiveDate,
) -> HashSet<Uuid> {
    if etapas.is_empty() {
        return graph
            .phases()
            .filter(|fase| is_phase_valid_for_quotation(&fase.nome, obra, today))
            .map(|fase| fase.id)
            .collect();
    }

    valid_etapas(etapas, today)
        .into_iter()
        .filter_map(|etapa| fase_id_of_etapa(graph, etapa))
        .collect()
}

/// Relatório por fase (ordem de cronologia) para o painel do cliente.
pub fn phase_report(
    graph: &CatalogGraph,
    obra: &Obra,
    etapas: &[ObraEtapa],
    today: NaiveDate,
) -> Vec<FaseElegibilidade> {
    let elegiveis = eligible_phase_ids(graph, obra, etapas, today);

    graph
        .phases()
        .map(|fase| {
            let janela_inicio = if etapas.is_empty() {
                phase_window_start(&fase.nome, obra)
            } else {
                etapas
                    .iter()
                    .filter(|etapa| fase_id_of_etapa(graph, etapa) == Some(fase.id))
                    .filter_map(etapa_window_start)
                    .min()
            };

            FaseElegibilidade {
                fase: fase.clone(),
                elegivel: elegiveis.contains(&fase.id),
                janela_inicio,
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::catalog::Fase;
    use crate::services::catalog_graph::CatalogRows;
    use chrono::Utc;
    use proptest::prelude::*;
    use rstest::rstest;
    use sqlx::types::Json;

    pub(crate) fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub(crate) fn obra(etapa: Option<&str>, inicio: Option<&str>, stages: Vec<ObraStage>) -> Obra {
        Obra {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            nome: "Residencial Ipê".into(),
            cep: None,
            logradouro: None,
            numero: None,
            bairro: None,
            cidade: None,
            uf: None,
            etapa: etapa.map(str::to_string),
            inicio_recebimento_oferta: inicio.map(date),
            stages: Json(stages),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub(crate) fn etapa(
        nome: &str,
        fase_id: Option<Uuid>,
        prevista: Option<&str>,
        dias: Option<i32>,
        concluida: bool,
    ) -> ObraEtapa {
        ObraEtapa {
            id: Uuid::new_v4(),
            obra_id: Uuid::new_v4(),
            fase_id,
            nome: nome.into(),
            data_prevista: prevista.map(date),
            dias_antecedencia_cotacao: dias,
            is_completed: concluida,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn stage(name: &str, predicted: Option<&str>, days: Option<i32>) -> ObraStage {
        ObraStage {
            name: name.into(),
            predicted_date: predicted.map(str::to_string),
            quotation_advance_days: days,
        }
    }

    #[rstest]
    #[case("2025-01-09", false)]
    #[case("2025-01-10", true)]
    #[case("2025-06-30", true)]
    fn declared_phase_uses_override_date(#[case] today: &str, #[case] expected: bool) {
        let obra = obra(Some("Fundação"), Some("2025-01-10"), vec![]);
        assert_eq!(is_phase_valid_for_quotation("Fundação", &obra, date(today)), expected);
    }

    #[test]
    fn override_wins_over_stage_entry() {
        let obra = obra(
            Some("Fundação"),
            Some("2025-01-10"),
            vec![stage("Fundação", Some("2025-01-05"), Some(0))],
        );
        assert!(!is_phase_valid_for_quotation("Fundação", &obra, date("2025-01-07")));
    }

    #[test]
    fn etapa_and_stage_names_ignore_surrounding_whitespace() {
        let declarada = obra(Some(" Fundação "), Some("2025-01-10"), vec![]);
        assert!(is_phase_valid_for_quotation("Fundação", &declarada, date("2025-01-10")));

        let cronograma = obra(None, None, vec![stage("Alvenaria\n", Some("2025-02-10"), Some(0))]);
        assert!(is_phase_valid_for_quotation(" Alvenaria", &cronograma, date("2025-02-10")));
    }

    #[test]
    fn malformed_jsonb_stages_are_not_eligible() {
        let stages: Vec<ObraStage> = serde_json::from_value(serde_json::json!([
            { "name": "Fundação", "predictedDate": "2025-01-20", "quotationAdvanceDays": "10" },
            { "name": "Alvenaria", "predictedDate": 20250101, "quotationAdvanceDays": 5 },
            { "name": "Cobertura", "predictedDate": "2025-03-01", "quotationAdvanceDays": "quinze" },
            "Acabamento"
        ]))
        .unwrap();
        let obra = obra(None, None, stages);
        let hoje = date("2025-06-01");

        // "10" em texto ainda é uma antecedência válida
        assert!(is_phase_valid_for_quotation("Fundação", &obra, hoje));
        assert!(!is_phase_valid_for_quotation("Alvenaria", &obra, hoje));
        assert!(!is_phase_valid_for_quotation("Cobertura", &obra, hoje));
        assert!(!is_phase_valid_for_quotation("Acabamento", &obra, hoje));
    }

    #[test]
    fn declared_phase_without_override_falls_back_to_stages() {
        let obra = obra(Some("Fundação"), None, vec![stage("Fundação", Some("2025-01-20"), Some(10))]);
        assert!(is_phase_valid_for_quotation("Fundação", &obra, date("2025-01-10")));
        assert!(!is_phase_valid_for_quotation("Fundação", &obra, date("2025-01-09")));
    }

    #[rstest]
    #[case(stage("Cobertura", Some("2025-05-20"), Some(20)), "2025-04-30", true)]
    #[case(stage("Cobertura", Some("2025-05-20"), Some(20)), "2025-04-29", false)]
    #[case(stage("Cobertura", Some("2025-05-20T23:59:00-03:00"), Some(0)), "2025-05-20", true)]
    #[case(stage("Cobertura", Some("20/05/2025"), Some(0)), "2025-05-20", true)]
    #[case(stage("Cobertura", Some("amanhã"), Some(5)), "2030-01-01", false)]
    #[case(stage("Cobertura", None, Some(5)), "2030-01-01", false)]
    #[case(stage("Cobertura", Some("2025-05-20"), None), "2030-01-01", false)]
    #[case(stage("Cobertura", Some("2025-05-20"), Some(-3)), "2030-01-01", false)]
    fn stage_rule_fails_closed(#[case] entry: ObraStage, #[case] today: &str, #[case] expected: bool) {
        let obra = obra(None, None, vec![entry]);
        assert_eq!(is_phase_valid_for_quotation("Cobertura", &obra, date(today)), expected);
    }

    #[test]
    fn unknown_phase_is_not_eligible() {
        let obra = obra(Some("Fundação"), Some("2020-01-01"), vec![]);
        assert!(!is_phase_valid_for_quotation("Acabamento", &obra, date("2030-01-01")));
    }

    #[rstest]
    #[case("2025-02-13", false)]
    #[case("2025-02-14", true)]
    #[case("2025-03-01", true)]
    #[case("2025-09-01", true)]
    fn etapa_window_is_inclusive(#[case] today: &str, #[case] expected: bool) {
        let e = etapa("Fundação", None, Some("2025-03-01"), Some(15), false);
        assert_eq!(etapa_window_start(&e), Some(date("2025-02-14")));
        assert_eq!(is_etapa_valid(&e, date(today)), expected);
    }

    #[test]
    fn completed_etapa_is_never_valid() {
        let e = etapa("Fundação", None, Some("2025-03-01"), Some(15), true);
        assert!(!is_etapa_valid(&e, date("2025-03-01")));
    }

    #[test]
    fn valid_etapas_filters_the_list() {
        let aberta = etapa("Fundação", None, Some("2025-03-01"), Some(15), false);
        let futura = etapa("Estrutura", None, Some("2025-06-01"), Some(15), false);
        let sem_data = etapa("Cobertura", None, None, Some(15), false);
        let etapas = vec![aberta.clone(), futura, sem_data];

        let validas = valid_etapas(&etapas, date("2025-03-02"));
        assert_eq!(validas.len(), 1);
        assert_eq!(validas[0].id, aberta.id);
    }

    fn catalogo(nomes: &[&str]) -> (CatalogGraph, Vec<Fase>) {
        let fases: Vec<Fase> = nomes
            .iter()
            .enumerate()
            .map(|(i, nome)| Fase { id: Uuid::new_v4(), cronologia: i as i32 + 1, nome: nome.to_string() })
            .collect();
        let rows = CatalogRows { fases: fases.clone(), ..Default::default() };
        (CatalogGraph::build(&rows), fases)
    }

    #[test]
    fn etapas_table_is_authoritative_when_present() {
        let (graph, fases) = catalogo(&["Fundação", "Estrutura"]);
        // O cronograma JSONB diria que Estrutura está aberta, mas há etapas cadastradas.
        let obra = obra(None, None, vec![stage("Estrutura", Some("2020-01-01"), Some(0))]);
        let etapas = vec![
            etapa("Fundação", Some(fases[0].id), Some("2025-03-01"), Some(15), false),
            etapa("Estrutura", Some(fases[1].id), Some("2025-09-01"), Some(15), false),
        ];

        let abertas = eligible_phase_ids(&graph, &obra, &etapas, date("2025-03-01"));
        assert_eq!(abertas, HashSet::from([fases[0].id]));
    }

    #[test]
    fn etapa_without_fase_id_resolves_by_name() {
        let (graph, fases) = catalogo(&["Fundação", "Estrutura"]);
        let obra = obra(None, None, vec![]);
        let etapas = vec![etapa("Estrutura", None, Some("2025-03-01"), Some(0), false)];

        let abertas = eligible_phase_ids(&graph, &obra, &etapas, date("2025-03-01"));
        assert_eq!(abertas, HashSet::from([fases[1].id]));
    }

    #[test]
    fn name_rule_applies_without_etapas() {
        let (graph, fases) = catalogo(&["Fundação", "Estrutura", "Cobertura"]);
        let obra = obra(
            Some("Fundação"),
            Some("2025-01-10"),
            vec![stage("Estrutura", Some("2025-02-01"), Some(10)), stage("Cobertura", None, Some(10))],
        );

        let abertas = eligible_phase_ids(&graph, &obra, &[], date("2025-01-22"));
        assert_eq!(abertas, HashSet::from([fases[0].id, fases[1].id]));

        let report = phase_report(&graph, &obra, &[], date("2025-01-22"));
        let resumo: Vec<(&str, bool, Option<NaiveDate>)> = report
            .iter()
            .map(|r| (r.fase.nome.as_str(), r.elegivel, r.janela_inicio))
            .collect();
        assert_eq!(
            resumo,
            vec![
                ("Fundação", true, Some(date("2025-01-10"))),
                ("Estrutura", true, Some(date("2025-01-22"))),
                ("Cobertura", false, None),
            ]
        );
    }

    proptest! {
        // depois de aberta, a janela não fecha com o passar dos dias
        #[test]
        fn window_is_monotonic(
            predicted_offset in 0i64..2000,
            days in 0i32..120,
            today_offset in 0i64..2000,
            later in 0u64..400,
        ) {
            let base = date("2024-01-01");
            let predicted = base + chrono::Duration::days(predicted_offset);
            let d = base + chrono::Duration::days(today_offset);
            let e = ObraEtapa {
                data_prevista: Some(predicted),
                dias_antecedencia_cotacao: Some(days),
                ..etapa("X", None, None, None, false)
            };

            if is_etapa_valid(&e, d) {
                prop_assert!(is_etapa_valid(&e, d + Days::new(later)));
                let concluida = ObraEtapa { is_completed: true, ..e.clone() };
                prop_assert!(!is_etapa_valid(&concluida, d + Days::new(later)));
            }

            let texto = predicted.format("%Y-%m-%d").to_string();
            let o = obra(None, None, vec![stage("X", Some(&texto), Some(days))]);
            if is_phase_valid_for_quotation("X", &o, d) {
                prop_assert!(is_phase_valid_for_quotation("X", &o, d + Days::new(later)));
            }
        }

        // sem data prevista, nunca válida
        #[test]
        fn missing_predicted_date_is_never_valid(
            days in proptest::option::of(-30i32..365),
            today_offset in -3650i64..3650,
        ) {
            let today = date("2025-01-01") + chrono::Duration::days(today_offset);
            let e = etapa("X", None, None, days, false);
            prop_assert!(!is_etapa_valid(&e, today));
        }
    }
}
