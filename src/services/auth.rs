// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::UserRepository,
    models::auth::{Claims, User, UserRole},
};

// Validade do token emitido no login/registro
const TOKEN_TTL_DAYS: i64 = 7;

// Emissão e leitura do JWT (HS256), sem tocar no banco
#[derive(Clone)]
pub struct JwtCodec {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
}

impl JwtCodec {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
        }
    }

    pub fn issue(&self, user_id: Uuid, role: UserRole) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + chrono::Duration::days(TOKEN_TTL_DAYS);

        let claims = Claims {
            sub: user_id,
            role,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        // Usa '?' para um tratamento de erro mais limpo
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn read(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::InvalidToken)
    }
}

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    jwt: JwtCodec,
    pool: PgPool,
}

impl AuthService {
    pub fn new(user_repo: UserRepository, jwt: JwtCodec, pool: PgPool) -> Self {
        Self { user_repo, jwt, pool }
    }

    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
        nome: &str,
        role: Option<UserRole>,
    ) -> Result<String, AppError> {
        // Admin não se cadastra pela API
        let role = match role.unwrap_or(UserRole::Cliente) {
            UserRole::Admin => return Err(AppError::RoleNotAllowed),
            role => role,
        };

        // 1. Hashing fora do runtime assíncrono
        let password_clone = password.to_owned();
        let hashed_password = tokio::task::spawn_blocking(move || {
            hash(&password_clone, bcrypt::DEFAULT_COST)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;

        // 2. Cria o usuário
        let new_user = self
            .user_repo
            .create_user(&self.pool, email.trim(), &hashed_password, nome.trim(), role)
            .await?;

        tracing::info!("👤 Novo usuário {} cadastrado como {:?}", new_user.id, new_user.role);

        // 3. Gera o token
        self.jwt.issue(new_user.id, new_user.role)
    }

    pub async fn login_user(&self, email: &str, password: &str) -> Result<String, AppError> {
        let user = self
            .user_repo
            .find_by_email(email.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid = tokio::task::spawn_blocking(move || {
            verify(&password_clone, &password_hash_clone)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        self.jwt.issue(user.id, user.role)
    }

    // O papel vem do banco, não do token: rebaixar alguém vale na hora.
    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let claims = self.jwt.read(token)?;

        self.user_repo
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)
    }
}
