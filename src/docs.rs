// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,

        // --- Catálogo ---
        handlers::catalog::search_catalog,
        handlers::catalog::material_relacoes,
        handlers::catalog::grupo_relacoes,

        // --- Admin Catálogo ---
        handlers::admin_catalog::list_fases,
        handlers::admin_catalog::upsert_fase,
        handlers::admin_catalog::reorder_fases,
        handlers::admin_catalog::delete_fase,
        handlers::admin_catalog::list_servicos,
        handlers::admin_catalog::upsert_servico,
        handlers::admin_catalog::delete_servico,
        handlers::admin_catalog::list_grupos,
        handlers::admin_catalog::upsert_grupo,
        handlers::admin_catalog::delete_grupo,
        handlers::admin_catalog::list_materiais,
        handlers::admin_catalog::upsert_material,
        handlers::admin_catalog::delete_material,
        handlers::admin_catalog::reload_catalog,

        // --- Obras ---
        handlers::obras::create_obra,
        handlers::obras::list_obras,
        handlers::obras::get_obra,
        handlers::obras::update_obra,
        handlers::obras::list_etapas,
        handlers::obras::add_etapa,
        handlers::obras::update_etapa,
        handlers::obras::concluir_etapa,
        handlers::obras::fases_elegiveis,
        handlers::obras::catalogo_da_obra,

        // --- Cotações ---
        handlers::cotacoes::submit_cotacao,
        handlers::cotacoes::list_cotacoes_da_obra,
        handlers::cotacoes::list_cotacoes,
        handlers::cotacoes::get_cotacao,
        handlers::cotacoes::cancelar_cotacao,
        handlers::documents::generate_cotacao_pdf,

        // --- Fornecedores ---
        handlers::fornecedores::list_grupos,
        handlers::fornecedores::set_grupos,
        handlers::fornecedores::cotacoes_relevantes,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::User,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Catálogo ---
            models::catalog::Fase,
            models::catalog::Servico,
            models::catalog::GrupoInsumo,
            models::catalog::Material,
            models::catalog::ServicoDetalhe,
            models::catalog::MaterialDetalhe,
            models::catalog::MaterialRelacoes,
            models::catalog::GrupoRelacoes,
            models::catalog::CatalogStats,
            models::catalog::CatalogTree,
            models::catalog::FaseNode,
            models::catalog::ServicoNode,
            models::catalog::GrupoNode,
            models::catalog::WarningKind,
            models::catalog::ValidationWarning,

            // --- Obras ---
            models::obra::Obra,
            models::obra::ObraStage,
            models::obra::ObraEtapa,
            models::obra::FaseElegibilidade,

            // --- Cotações ---
            models::cotacao::CotacaoStatus,
            models::cotacao::Cotacao,
            models::cotacao::CotacaoItem,
            models::cotacao::CotacaoDetalhe,

            // --- Payloads ---
            handlers::admin_catalog::UpsertFasePayload,
            handlers::admin_catalog::ReorderFasesPayload,
            handlers::admin_catalog::UpsertServicoPayload,
            handlers::admin_catalog::UpsertGrupoPayload,
            handlers::admin_catalog::UpsertMaterialPayload,
            handlers::obras::ObraPayload,
            handlers::obras::EtapaPayload,
            handlers::obras::ConcluirEtapaPayload,
            handlers::cotacoes::CarrinhoItemPayload,
            handlers::cotacoes::CotacaoPayload,
            handlers::fornecedores::GruposAtendidosPayload,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário"),
        (name = "Catálogo", description = "Busca no catálogo Fase > Serviço > Grupo > Material"),
        (name = "Admin Catálogo", description = "Manutenção do catálogo (somente admin)"),
        (name = "Obras", description = "Obras, cronograma e janela de cotação"),
        (name = "Cotações", description = "Envio e acompanhamento de pedidos de cotação"),
        (name = "Fornecedores", description = "Grupos atendidos e cotações relevantes")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_main_routes_and_jwt_scheme() {
        let doc = ApiDoc::openapi();

        for path in [
            "/api/catalogo",
            "/api/admin/fases/{id}",
            "/api/obras/{id}/fases-elegiveis",
            "/api/obras/{id}/cotacoes",
            "/api/cotacoes/{id}/pdf",
            "/api/fornecedores/me/grupos",
        ] {
            assert!(doc.paths.paths.contains_key(path), "rota ausente: {}", path);
        }

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("api_jwt"));
    }
}
