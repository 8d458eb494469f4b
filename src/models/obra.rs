// src/models/obra.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::catalog::Fase;

// --- 1. Obra (o projeto do cliente) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Obra {
    pub id: Uuid,
    pub owner_id: Uuid,
    #[schema(example = "Residencial Ipê")]
    pub nome: String,

    #[schema(example = "01310-100")]
    pub cep: Option<String>,
    pub logradouro: Option<String>,
    pub numero: Option<String>,
    pub bairro: Option<String>,
    pub cidade: Option<String>,
    #[schema(example = "SP")]
    pub uf: Option<String>,

    // Nome da fase em que a obra declara estar
    #[schema(example = "Fundação")]
    pub etapa: Option<String>,
    // Data explícita a partir da qual a etapa atual recebe ofertas
    pub inicio_recebimento_oferta: Option<NaiveDate>,

    // Cronograma simplificado guardado em JSONB (formato legado do painel)
    #[schema(value_type = Vec<ObraStage>)]
    pub stages: Json<Vec<ObraStage>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Entrada do cronograma JSONB. Os campos são frouxos de propósito: valores
// ausentes ou mal formados tornam a fase inelegível, nunca quebram a leitura.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObraStage {
    #[schema(example = "Fundação")]
    pub name: String,
    #[schema(example = "2025-03-01")]
    pub predicted_date: Option<String>,
    #[schema(example = 15)]
    pub quotation_advance_days: Option<i32>,
}

// Lido via `Value`: tipo errado vira `None`, entrada que não é objeto vira
// uma fase sem nome (não casa com nenhuma fase do catálogo).
impl<'de> Deserialize<'de> for ObraStage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let Value::Object(campos) = value else {
            return Ok(Self::default());
        };

        let name = match campos.get("name") {
            Some(Value::String(name)) => name.clone(),
            _ => String::new(),
        };
        let predicted_date = match campos.get("predictedDate") {
            Some(Value::String(data)) => Some(data.clone()),
            _ => None,
        };
        let quotation_advance_days = match campos.get("quotationAdvanceDays") {
            Some(Value::Number(n)) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            Some(Value::String(raw)) => raw.trim().parse().ok(),
            _ => None,
        };

        Ok(Self {
            name,
            predicted_date,
            quotation_advance_days,
        })
    }
}

// --- 2. Etapa da obra (instância de uma fase no cronograma) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObraEtapa {
    pub id: Uuid,
    pub obra_id: Uuid,
    pub fase_id: Option<Uuid>,
    #[schema(example = "Fundação")]
    pub nome: String,
    #[schema(example = "2025-03-01")]
    pub data_prevista: Option<NaiveDate>,
    #[schema(example = 15)]
    pub dias_antecedencia_cotacao: Option<i32>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Situação de cada fase do catálogo para uma obra, num dado dia
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FaseElegibilidade {
    #[serde(flatten)]
    pub fase: Fase,
    pub elegivel: bool,
    // Primeiro dia da janela de cotação, quando calculável
    pub janela_inicio: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stage_with_wrong_types_is_read_leniently() {
        let stages: Vec<ObraStage> = serde_json::from_value(json!([
            { "name": "Fundação", "predictedDate": "2025-01-20", "quotationAdvanceDays": "15" },
            42,
            { "name": "Alvenaria", "predictedDate": 20250101, "quotationAdvanceDays": true },
            { "name": "Cobertura", "quotationAdvanceDays": 99999999999i64 }
        ]))
        .unwrap();

        assert_eq!(stages.len(), 4);
        assert_eq!(stages[0].quotation_advance_days, Some(15));
        assert_eq!(stages[0].predicted_date.as_deref(), Some("2025-01-20"));
        assert_eq!(stages[1], ObraStage::default());
        assert_eq!(stages[2].name, "Alvenaria");
        assert_eq!(stages[2].predicted_date, None);
        assert_eq!(stages[2].quotation_advance_days, None);
        assert_eq!(stages[3].quotation_advance_days, None);
    }

    #[test]
    fn stage_missing_fields_defaults_to_none() {
        let stage: ObraStage = serde_json::from_value(json!({ "name": "Acabamento" })).unwrap();
        assert_eq!(stage.name, "Acabamento");
        assert_eq!(stage.predicted_date, None);
        assert_eq!(stage.quotation_advance_days, None);
    }
}
