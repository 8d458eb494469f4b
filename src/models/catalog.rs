// src/models/catalog.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- 1. Fase (etapa-modelo da obra) ---
// `cronologia` é a chave de ordenação: única e estritamente crescente.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Fase {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    #[schema(example = 1)]
    pub cronologia: i32,
    #[schema(example = "Fundação")]
    pub nome: String,
}

// --- 2. Serviço ---
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Servico {
    pub id: Uuid,
    #[schema(example = "Concretagem de sapatas")]
    pub nome: String,
    // Ordem de exibição dentro da fase
    #[schema(example = 10)]
    pub ordem: i32,
    pub descricao: Option<String>,
}

// --- 3. Grupo de Insumo ---
// Nó de categorização: sem dono, ligado a serviços, materiais e fornecedores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrupoInsumo {
    pub id: Uuid,
    #[schema(example = "Cimento e argamassa")]
    pub nome: String,
    pub descricao: Option<String>,
}

// --- 4. Material ---
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: Uuid,
    #[schema(example = "Cimento CP-II 50kg")]
    pub nome: String,
    #[schema(example = "saco")]
    pub unidade: String,
    pub descricao: Option<String>,
}

// --- Tabelas de junção ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct ServicoFase {
    pub servico_id: Uuid,
    pub fase_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct ServicoGrupo {
    pub servico_id: Uuid,
    pub grupo_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, FromRow)]
pub struct MaterialGrupo {
    pub material_id: Uuid,
    pub grupo_id: Uuid,
}

// --- DTOs de resposta ---

// Serviço com os vínculos resolvidos (o formato que o painel admin edita)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServicoDetalhe {
    #[serde(flatten)]
    pub servico: Servico,
    pub fase_ids: Vec<Uuid>,
    pub grupos_insumo_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDetalhe {
    #[serde(flatten)]
    pub material: Material,
    pub grupos_insumo_ids: Vec<Uuid>,
}

// "Em quais fases/serviços este material aparece?"
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRelacoes {
    pub material: Material,
    pub grupos: Vec<GrupoInsumo>,
    pub servicos: Vec<Servico>,
    pub fases: Vec<Fase>,
}

// "O que pertence a este grupo?"
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrupoRelacoes {
    pub grupo: GrupoInsumo,
    pub materiais: Vec<Material>,
    pub servicos: Vec<Servico>,
    pub fases: Vec<Fase>,
}

// Contagens por ids distintos: um material que aparece em dois grupos conta uma vez.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub fases: usize,
    pub servicos: usize,
    pub grupos: usize,
    pub materiais: usize,
}

// --- Árvore filtrada do catálogo ---

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTree {
    pub fases: Vec<FaseNode>,
    pub totais: CatalogStats,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FaseNode {
    #[serde(flatten)]
    pub fase: Fase,
    pub servicos: Vec<ServicoNode>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServicoNode {
    #[serde(flatten)]
    pub servico: Servico,
    pub grupos: Vec<GrupoNode>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GrupoNode {
    #[serde(flatten)]
    pub grupo: GrupoInsumo,
    pub materiais: Vec<Material>,
}

// --- Aviso de validação (não bloqueante) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    // A fase mais antiga do material não é a etapa atual da obra
    MaterialForaDaFase,
    // O material não alcança nenhuma fase pelo catálogo
    MaterialSemFase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidationWarning {
    pub kind: WarningKind,
    pub material_id: Uuid,
    #[schema(example = "Telha cerâmica")]
    pub material_nome: String,
    #[schema(example = "Cobertura")]
    pub fase_do_material: Option<String>,
    #[schema(example = "Fundação")]
    pub etapa_atual: String,
}
