//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppState, Config};
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Lê o .env antes do logger para que RUST_LOG valha
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Catálogo vazio não impede a subida; a primeira busca tenta de novo
    if let Err(e) = app_state.catalog_service.reload().await {
        tracing::warn!("Catálogo não carregado na inicialização: {}", e);
    }

    // Define as rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    let user_routes = Router::new().route("/users/me", get(handlers::auth::get_me));

    let catalog_routes = Router::new()
        .route("/catalogo", get(handlers::catalog::search_catalog))
        .route(
            "/catalogo/materiais/{id}/relacoes",
            get(handlers::catalog::material_relacoes),
        )
        .route(
            "/catalogo/grupos/{id}/relacoes",
            get(handlers::catalog::grupo_relacoes),
        );

    let admin_routes = Router::new()
        .route("/fases", get(handlers::admin_catalog::list_fases))
        .route("/fases/ordem", post(handlers::admin_catalog::reorder_fases))
        .route(
            "/fases/{id}",
            put(handlers::admin_catalog::upsert_fase).delete(handlers::admin_catalog::delete_fase),
        )
        .route("/servicos", get(handlers::admin_catalog::list_servicos))
        .route(
            "/servicos/{id}",
            put(handlers::admin_catalog::upsert_servico)
                .delete(handlers::admin_catalog::delete_servico),
        )
        .route("/grupos", get(handlers::admin_catalog::list_grupos))
        .route(
            "/grupos/{id}",
            put(handlers::admin_catalog::upsert_grupo).delete(handlers::admin_catalog::delete_grupo),
        )
        .route("/materiais", get(handlers::admin_catalog::list_materiais))
        .route(
            "/materiais/{id}",
            put(handlers::admin_catalog::upsert_material)
                .delete(handlers::admin_catalog::delete_material),
        )
        .route("/catalogo/reload", post(handlers::admin_catalog::reload_catalog));

    let obra_routes = Router::new()
        .route(
            "/obras",
            post(handlers::obras::create_obra).get(handlers::obras::list_obras),
        )
        .route(
            "/obras/{id}",
            get(handlers::obras::get_obra).put(handlers::obras::update_obra),
        )
        .route(
            "/obras/{id}/etapas",
            get(handlers::obras::list_etapas).post(handlers::obras::add_etapa),
        )
        .route("/obras/{id}/etapas/{etapa_id}", put(handlers::obras::update_etapa))
        .route(
            "/obras/{id}/etapas/{etapa_id}/concluir",
            post(handlers::obras::concluir_etapa),
        )
        .route("/obras/{id}/fases-elegiveis", get(handlers::obras::fases_elegiveis))
        .route("/obras/{id}/catalogo", get(handlers::obras::catalogo_da_obra));

    let cotacao_routes = Router::new()
        .route(
            "/obras/{id}/cotacoes",
            post(handlers::cotacoes::submit_cotacao).get(handlers::cotacoes::list_cotacoes_da_obra),
        )
        .route("/cotacoes", get(handlers::cotacoes::list_cotacoes))
        .route("/cotacoes/{id}", get(handlers::cotacoes::get_cotacao))
        .route("/cotacoes/{id}/cancelar", post(handlers::cotacoes::cancelar_cotacao))
        .route("/cotacoes/{id}/pdf", get(handlers::documents::generate_cotacao_pdf));

    let fornecedor_routes = Router::new()
        .route(
            "/fornecedores/me/grupos",
            get(handlers::fornecedores::list_grupos).put(handlers::fornecedores::set_grupos),
        )
        .route(
            "/fornecedores/me/cotacoes",
            get(handlers::fornecedores::cotacoes_relevantes),
        );

    // Tudo abaixo exige token válido
    let protected_routes = Router::new()
        .merge(user_routes)
        .merge(catalog_routes)
        .nest("/admin", admin_routes)
        .merge(obra_routes)
        .merge(cotacao_routes)
        .merge(fornecedor_routes)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            auth_guard,
        ));

    // Combina tudo no router principal
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api", protected_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
