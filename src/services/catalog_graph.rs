// src/services/catalog_graph.rs
//
// Grafo do catálogo: Fase -> Serviço -> Grupo de Insumo -> Material.
//
// As linhas chegam "cruas" do banco (quatro coleções + três tabelas de junção)
// e viram índices de adjacência por id, construídos uma única vez por carga.
// O grafo é imutável: qualquer mudança gera um novo `CatalogGraph` a partir de
// `CatalogRows`.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::catalog::{
    CatalogStats, Fase, GrupoInsumo, Material, MaterialGrupo, Servico, ServicoFase, ServicoGrupo,
};

type Adjacency = HashMap<Uuid, Vec<Uuid>>;

// ---
// Linhas cruas (o que o banco devolve)
// ---

#[derive(Debug, Clone, Default)]
pub struct CatalogRows {
    pub fases: Vec<Fase>,
    pub servicos: Vec<Servico>,
    pub grupos: Vec<GrupoInsumo>,
    pub materiais: Vec<Material>,
    pub servico_fase: Vec<ServicoFase>,
    pub servico_grupo: Vec<ServicoGrupo>,
    pub material_grupo: Vec<MaterialGrupo>,
}

fn upsert_by_id<T>(items: &mut Vec<T>, item: T, id_of: impl Fn(&T) -> Uuid) {
    let id = id_of(&item);
    match items.iter_mut().find(|existing| id_of(existing) == id) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}

fn remove_by_id<T>(items: &mut Vec<T>, id: Uuid, id_of: impl Fn(&T) -> Uuid) -> bool {
    let before = items.len();
    items.retain(|item| id_of(item) != id);
    items.len() != before
}

// Edições locais (otimistas) aplicadas depois que o banco confirmou a escrita.
// Remover um nó só desfaz as linhas de junção dele; o outro lado fica intacto.
impl CatalogRows {
    pub fn upsert_fase(&mut self, fase: Fase) {
        upsert_by_id(&mut self.fases, fase, |f| f.id);
    }

    /// Reatribui `cronologia` de forma densa (1..n) na ordem recebida.
    pub fn reorder_fases(&mut self, ordem: &[Uuid]) {
        for (posicao, id) in ordem.iter().enumerate() {
            if let Some(fase) = self.fases.iter_mut().find(|f| f.id == *id) {
                fase.cronologia = posicao as i32 + 1;
            }
        }
    }

    pub fn upsert_servico(&mut self, servico: Servico, fase_ids: &[Uuid], grupo_ids: &[Uuid]) {
        let servico_id = servico.id;
        upsert_by_id(&mut self.servicos, servico, |s| s.id);

        self.servico_fase.retain(|link| link.servico_id != servico_id);
        self.servico_fase
            .extend(fase_ids.iter().map(|&fase_id| ServicoFase { servico_id, fase_id }));

        self.servico_grupo.retain(|link| link.servico_id != servico_id);
        self.servico_grupo
            .extend(grupo_ids.iter().map(|&grupo_id| ServicoGrupo { servico_id, grupo_id }));
    }

    pub fn upsert_grupo(&mut self, grupo: GrupoInsumo) {
        upsert_by_id(&mut self.grupos, grupo, |g| g.id);
    }

    pub fn upsert_material(&mut self, material: Material, grupo_ids: &[Uuid]) {
        let material_id = material.id;
        upsert_by_id(&mut self.materiais, material, |m| m.id);

        self.material_grupo.retain(|link| link.material_id != material_id);
        self.material_grupo
            .extend(grupo_ids.iter().map(|&grupo_id| MaterialGrupo { material_id, grupo_id }));
    }

    pub fn remove_fase(&mut self, id: Uuid) -> bool {
        self.servico_fase.retain(|link| link.fase_id != id);
        remove_by_id(&mut self.fases, id, |f| f.id)
    }

    pub fn remove_servico(&mut self, id: Uuid) -> bool {
        self.servico_fase.retain(|link| link.servico_id != id);
        self.servico_grupo.retain(|link| link.servico_id != id);
        remove_by_id(&mut self.servicos, id, |s| s.id)
    }

    pub fn remove_grupo(&mut self, id: Uuid) -> bool {
        self.servico_grupo.retain(|link| link.grupo_id != id);
        self.material_grupo.retain(|link| link.grupo_id != id);
        remove_by_id(&mut self.grupos, id, |g| g.id)
    }

    pub fn remove_material(&mut self, id: Uuid) -> bool {
        self.material_grupo.retain(|link| link.material_id != id);
        remove_by_id(&mut self.materiais, id, |m| m.id)
    }

    pub fn fase_ids_of_servico(&self, servico_id: Uuid) -> Vec<Uuid> {
        self.servico_fase
            .iter()
            .filter(|link| link.servico_id == servico_id)
            .map(|link| link.fase_id)
            .collect()
    }

    pub fn grupo_ids_of_servico(&self, servico_id: Uuid) -> Vec<Uuid> {
        self.servico_grupo
            .iter()
            .filter(|link| link.servico_id == servico_id)
            .map(|link| link.grupo_id)
            .collect()
    }

    pub fn grupo_ids_of_material(&self, material_id: Uuid) -> Vec<Uuid> {
        self.material_grupo
            .iter()
            .filter(|link| link.material_id == material_id)
            .map(|link| link.grupo_id)
            .collect()
    }
}

// ---
// O grafo
// ---

#[derive(Debug, Clone, Default)]
pub struct CatalogGraph {
    fases: HashMap<Uuid, Fase>,
    servicos: HashMap<Uuid, Servico>,
    grupos: HashMap<Uuid, GrupoInsumo>,
    materiais: HashMap<Uuid, Material>,

    // Todas as fases, em ordem de cronologia
    fases_ordenadas: Vec<Uuid>,

    // Adjacência direta (vinda das tabelas de junção)
    servicos_por_fase: Adjacency,
    fases_por_servico: Adjacency,
    grupos_por_servico: Adjacency,
    servicos_por_grupo: Adjacency,
    materiais_por_grupo: Adjacency,
    grupos_por_material: Adjacency,

    // Adjacência derivada (um salto sobre a direta)
    fases_por_grupo: Adjacency,
    servicos_por_material: Adjacency,
    fases_por_material: Adjacency,
}

// Insere a aresta nos dois sentidos, ignorando repetições.
fn link(
    forward: &mut Adjacency,
    backward: &mut Adjacency,
    seen: &mut HashSet<(Uuid, Uuid)>,
    from: Uuid,
    to: Uuid,
) {
    if seen.insert((from, to)) {
        forward.entry(from).or_default().push(to);
        backward.entry(to).or_default().push(from);
    }
}

// União sem repetição dos vizinhos de `via` para cada id de `start`.
fn one_hop(start: &[Uuid], via: &Adjacency) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    start
        .iter()
        .filter_map(|id| via.get(id))
        .flatten()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}

fn by_cronologia(fases: &HashMap<Uuid, Fase>) -> impl Fn(&Uuid, &Uuid) -> Ordering + '_ {
    move |a: &Uuid, b: &Uuid| {
        let key = |id: &Uuid| fases.get(id).map(|f| (f.cronologia, *id));
        key(a).cmp(&key(b))
    }
}

fn by_ordem(servicos: &HashMap<Uuid, Servico>) -> impl Fn(&Uuid, &Uuid) -> Ordering + '_ {
    move |a: &Uuid, b: &Uuid| {
        let key = |id: &Uuid| servicos.get(id).map(|s| (s.ordem, s.nome.as_str(), *id));
        key(a).cmp(&key(b))
    }
}

fn by_nome<'a, T>(
    items: &'a HashMap<Uuid, T>,
    nome: impl Fn(&T) -> &str + 'a,
) -> impl Fn(&Uuid, &Uuid) -> Ordering + 'a {
    move |a: &Uuid, b: &Uuid| {
        let key = |id: &Uuid| items.get(id).map(|item| (nome(item), *id));
        key(a).cmp(&key(b))
    }
}

fn sort_lists(adjacency: &mut Adjacency, compare: impl Fn(&Uuid, &Uuid) -> Ordering) {
    for list in adjacency.values_mut() {
        list.sort_by(&compare);
    }
}

fn resolve<'a, T>(ids: Option<&Vec<Uuid>>, items: &'a HashMap<Uuid, T>) -> Vec<&'a T> {
    ids.map(|ids| ids.iter().filter_map(|id| items.get(id)).collect())
        .unwrap_or_default()
}

impl CatalogGraph {
    /// Monta o grafo em O(V+E). Arestas que apontam para ids inexistentes são
    /// descartadas: o banco garante a integridade, aqui só nos protegemos.
    pub fn build(rows: &CatalogRows) -> Self {
        let fases: HashMap<Uuid, Fase> = rows.fases.iter().map(|f| (f.id, f.clone())).collect();
        let servicos: HashMap<Uuid, Servico> =
            rows.servicos.iter().map(|s| (s.id, s.clone())).collect();
        let grupos: HashMap<Uuid, GrupoInsumo> =
            rows.grupos.iter().map(|g| (g.id, g.clone())).collect();
        let materiais: HashMap<Uuid, Material> =
            rows.materiais.iter().map(|m| (m.id, m.clone())).collect();

        let mut dropped = 0usize;

        // 1. Fase <-> Serviço
        let mut servicos_por_fase = Adjacency::new();
        let mut fases_por_servico = Adjacency::new();
        let mut seen = HashSet::new();
        for edge in &rows.servico_fase {
            if !fases.contains_key(&edge.fase_id) || !servicos.contains_key(&edge.servico_id) {
                dropped += 1;
                continue;
            }
            link(&mut servicos_por_fase, &mut fases_por_servico, &mut seen, edge.fase_id, edge.servico_id);
        }

        // 2. Serviço <-> Grupo
        let mut grupos_por_servico = Adjacency::new();
        let mut servicos_por_grupo = Adjacency::new();
        let mut seen = HashSet::new();
        for edge in &rows.servico_grupo {
            if !servicos.contains_key(&edge.servico_id) || !grupos.contains_key(&edge.grupo_id) {
                dropped += 1;
                continue;
            }
            link(&mut grupos_por_servico, &mut servicos_por_grupo, &mut seen, edge.servico_id, edge.grupo_id);
        }

        // 3. Grupo <-> Material
        let mut materiais_por_grupo = Adjacency::new();
        let mut grupos_por_material = Adjacency::new();
        let mut seen = HashSet::new();
        for edge in &rows.material_grupo {
            if !grupos.contains_key(&edge.grupo_id) || !materiais.contains_key(&edge.material_id) {
                dropped += 1;
                continue;
            }
            link(&mut materiais_por_grupo, &mut grupos_por_material, &mut seen, edge.grupo_id, edge.material_id);
        }

        if dropped > 0 {
            tracing::debug!("Grafo do catálogo: {} vínculo(s) órfão(s) descartado(s)", dropped);
        }

        // 4. Derivados (um salto sobre o que já existe)
        let mut fases_por_grupo: Adjacency = servicos_por_grupo
            .iter()
            .map(|(grupo_id, servico_ids)| (*grupo_id, one_hop(servico_ids, &fases_por_servico)))
            .collect();

        let mut servicos_por_material: Adjacency = grupos_por_material
            .iter()
            .map(|(material_id, grupo_ids)| (*material_id, one_hop(grupo_ids, &servicos_por_grupo)))
            .collect();

        let mut fases_por_material: Adjacency = servicos_por_material
            .iter()
            .map(|(material_id, servico_ids)| (*material_id, one_hop(servico_ids, &fases_por_servico)))
            .collect();

        // 5. Ordenação determinística de todas as listas
        sort_lists(&mut servicos_por_fase, by_ordem(&servicos));
        sort_lists(&mut servicos_por_grupo, by_ordem(&servicos));
        sort_lists(&mut servicos_por_material, by_ordem(&servicos));
        sort_lists(&mut fases_por_servico, by_cronologia(&fases));
        sort_lists(&mut fases_por_grupo, by_cronologia(&fases));
        sort_lists(&mut fases_por_material, by_cronologia(&fases));
        sort_lists(&mut grupos_por_servico, by_nome(&grupos, |g: &GrupoInsumo| g.nome.as_str()));
        sort_lists(&mut grupos_por_material, by_nome(&grupos, |g: &GrupoInsumo| g.nome.as_str()));
        sort_lists(&mut materiais_por_grupo, by_nome(&materiais, |m: &Material| m.nome.as_str()));

        let mut fases_ordenadas: Vec<Uuid> = fases.keys().copied().collect();
        fases_ordenadas.sort_by(by_cronologia(&fases));

        Self {
            fases,
            servicos,
            grupos,
            materiais,
            fases_ordenadas,
            servicos_por_fase,
            fases_por_servico,
            grupos_por_servico,
            servicos_por_grupo,
            materiais_por_grupo,
            grupos_por_material,
            fases_por_grupo,
            servicos_por_material,
            fases_por_material,
        }
    }

    // --- Nós ---

    pub fn fase(&self, id: Uuid) -> Option<&Fase> {
        self.fases.get(&id)
    }

    pub fn servico(&self, id: Uuid) -> Option<&Servico> {
        self.servicos.get(&id)
    }

    pub fn grupo(&self, id: Uuid) -> Option<&GrupoInsumo> {
        self.grupos.get(&id)
    }

    pub fn material(&self, id: Uuid) -> Option<&Material> {
        self.materiais.get(&id)
    }

    /// Todas as fases, ordenadas por cronologia.
    pub fn phases(&self) -> impl Iterator<Item = &Fase> + '_ {
        self.fases_ordenadas.iter().filter_map(|id| self.fases.get(id))
    }

    pub fn phase_by_name(&self, nome: &str) -> Option<&Fase> {
        self.phases().find(|f| f.nome == nome)
    }

    // --- Adjacência direta ---

    /// Serviços da fase, na ordem de exibição (`ordem`).
    pub fn services_by_phase(&self, fase_id: Uuid) -> Vec<&Servico> {
        resolve(self.servicos_por_fase.get(&fase_id), &self.servicos)
    }

    pub fn phases_by_service(&self, servico_id: Uuid) -> Vec<&Fase> {
        resolve(self.fases_por_servico.get(&servico_id), &self.fases)
    }

    pub fn groups_by_service(&self, servico_id: Uuid) -> Vec<&GrupoInsumo> {
        resolve(self.grupos_por_servico.get(&servico_id), &self.grupos)
    }

    pub fn services_by_group(&self, grupo_id: Uuid) -> Vec<&Servico> {
        resolve(self.servicos_por_grupo.get(&grupo_id), &self.servicos)
    }

    pub fn materials_by_group(&self, grupo_id: Uuid) -> Vec<&Material> {
        resolve(self.materiais_por_grupo.get(&grupo_id), &self.materiais)
    }

    pub fn groups_by_material(&self, material_id: Uuid) -> Vec<&GrupoInsumo> {
        resolve(self.grupos_por_material.get(&material_id), &self.grupos)
    }

    // --- Adjacência derivada ---

    /// Fases dos serviços que usam o grupo, por cronologia.
    pub fn phases_by_group(&self, grupo_id: Uuid) -> Vec<&Fase> {
        resolve(self.fases_por_grupo.get(&grupo_id), &self.fases)
    }

    pub fn services_by_material(&self, material_id: Uuid) -> Vec<&Servico> {
        resolve(self.servicos_por_material.get(&material_id), &self.servicos)
    }

    /// Fases alcançáveis a partir do material, por cronologia e sem repetição.
    pub fn phases_by_material(&self, material_id: Uuid) -> Vec<&Fase> {
        resolve(self.fases_por_material.get(&material_id), &self.fases)
    }

    /// A fase de menor cronologia que usa o material.
    pub fn earliest_phase_of_material(&self, material_id: Uuid) -> Option<&Fase> {
        self.phases_by_material(material_id).into_iter().next()
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            fases: self.fases.len(),
            servicos: self.servicos.len(),
            grupos: self.grupos.len(),
            materiais: self.materiais.len(),
        }
    }
}
