// src/config.rs

use axum::extract::FromRef;
use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, sync::Arc, time::Duration};

use crate::{
    common::i18n::I18nStore,
    db::{CatalogRepository, CotacaoRepository, FornecedorRepository, ObraRepository, UserRepository},
    services::{
        auth::{AuthService, JwtCodec},
        catalog_service::CatalogService,
        cotacao_service::CotacaoService,
        document_service::DocumentService,
        fornecedor_service::FornecedorService,
        obra_service::ObraService,
    },
};

// Configuração lida do ambiente (.env em desenvolvimento)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub database_max_connections: u32,
    // Fuso do negócio: o "hoje" da elegibilidade é calculado nele
    pub business_utc_offset_hours: i32,
    pub catalog_cache_ttl: Duration,
    pub public_base_url: String,
    pub fonts_dir: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL deve ser definida"))?;
        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET deve ser definido"))?;

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:3000"),
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 5)?,
            business_utc_offset_hours: check_offset_hours(parse_env(
                "BUSINESS_UTC_OFFSET_HOURS",
                -3,
            )?)?,
            catalog_cache_ttl: Duration::from_secs(parse_env("CATALOG_CACHE_TTL_SECS", 300)?),
            public_base_url: env_or("PUBLIC_BASE_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            fonts_dir: env_or("FONTS_DIR", "./fonts"),
        })
    }

    /// Data de hoje no fuso do negócio. Offset inválido cai para UTC.
    pub fn today(&self) -> NaiveDate {
        let offset = self
            .business_utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                tracing::warn!(
                    "BUSINESS_UTC_OFFSET_HOURS inválido ({}), usando UTC",
                    self.business_utc_offset_hours
                );
                Utc.fix()
            });
        Utc::now().with_timezone(&offset).date_naive()
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn check_offset_hours(hours: i32) -> anyhow::Result<i32> {
    if (-23..=23).contains(&hours) {
        Ok(hours)
    } else {
        anyhow::bail!("BUSINESS_UTC_OFFSET_HOURS fora do intervalo -23..=23: {}", hours)
    }
}

fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} inválido ('{}'): {}", key, raw, e)),
        Err(_) => Ok(default),
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<Config>,
    pub i18n_store: I18nStore,

    pub auth_service: AuthService,
    pub catalog_service: CatalogService,
    pub obra_service: ObraService,
    pub cotacao_service: CotacaoService,
    pub fornecedor_service: FornecedorService,
    pub document_service: DocumentService,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let i18n_store = I18nStore::load()?;

        // --- Monta o gráfico de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let catalog_repo = CatalogRepository::new(db_pool.clone());
        let obra_repo = ObraRepository::new(db_pool.clone());
        let cotacao_repo = CotacaoRepository::new(db_pool.clone());
        let fornecedor_repo = FornecedorRepository::new(db_pool.clone());

        let auth_service =
            AuthService::new(user_repo, JwtCodec::new(&config.jwt_secret), db_pool.clone());
        let catalog_service =
            CatalogService::new(catalog_repo, db_pool.clone(), config.catalog_cache_ttl);
        let obra_service =
            ObraService::new(obra_repo.clone(), catalog_service.clone(), db_pool.clone());
        let cotacao_service = CotacaoService::new(
            cotacao_repo,
            obra_repo,
            catalog_service.clone(),
            db_pool.clone(),
        );
        let fornecedor_service = FornecedorService::new(fornecedor_repo, db_pool.clone());
        let document_service =
            DocumentService::new(config.fonts_dir.clone(), config.public_base_url.clone());

        Ok(Self {
            db_pool,
            config: Arc::new(config),
            i18n_store,
            auth_service,
            catalog_service,
            obra_service,
            cotacao_service,
            fornecedor_service,
            document_service,
        })
    }
}

impl FromRef<AppState> for I18nStore {
    fn from_ref(app_state: &AppState) -> I18nStore {
        app_state.i18n_store.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(offset: i32) -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: String::new(),
            bind_addr: String::new(),
            database_max_connections: 5,
            business_utc_offset_hours: offset,
            catalog_cache_ttl: Duration::from_secs(300),
            public_base_url: String::new(),
            fonts_dir: String::new(),
        }
    }

    #[test]
    fn today_follows_business_offset() {
        let hoje_utc = Utc::now().date_naive();
        let hoje = config(-3).today();
        // -3h fica no mesmo dia ou no anterior
        assert!(hoje == hoje_utc || hoje.succ_opt() == Some(hoje_utc));
    }

    #[test]
    fn invalid_offset_falls_back_to_utc() {
        for offset in [99, 600_000, i32::MIN] {
            let antes = Utc::now().date_naive();
            let hoje = config(offset).today();
            let depois = Utc::now().date_naive();
            assert!(hoje == antes || hoje == depois);
        }
    }

    #[test]
    fn offset_outside_a_day_is_rejected_at_startup() {
        assert_eq!(check_offset_hours(-3).unwrap(), -3);
        assert_eq!(check_offset_hours(23).unwrap(), 23);
        assert_eq!(check_offset_hours(-23).unwrap(), -23);
        assert!(check_offset_hours(24).is_err());
        assert!(check_offset_hours(600_000).is_err());
        assert!(check_offset_hours(i32::MIN).is_err());
    }
}
