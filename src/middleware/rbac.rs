// src/middleware/rbac.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use std::marker::PhantomData;

use crate::{
    common::{
        error::{ApiError, AppError},
        i18n::I18nStore,
    },
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::auth::UserRole,
};

/// 1. O Trait que define quem pode passar
pub trait RoleDef: Send + Sync + 'static {
    fn allows(role: UserRole) -> bool;
}

/// 2. O Extractor (Guardião). Depende do `auth_guard` ter rodado antes.
pub struct RequireRole<R>(pub PhantomData<R>);

// 3. Implementação do FromRequestParts
impl<R, S> FromRequestParts<S> for RequireRole<R>
where
    R: RoleDef,
    S: Send + Sync,
    I18nStore: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let store = I18nStore::from_ref(state);
        let locale = Locale::from_headers(&parts.headers);

        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or(AppError::InvalidToken)
            .map_err(|e| e.to_api_error(&locale, &store))?;

        if !R::allows(user.0.role) {
            tracing::debug!("Acesso negado para {} ({:?})", user.0.id, user.0.role);
            return Err(AppError::Forbidden.to_api_error(&locale, &store));
        }

        Ok(RequireRole(PhantomData))
    }
}

// ---
// DEFINIÇÃO DOS PAPÉIS (TIPOS)
// ---

pub struct RoleAdmin;
impl RoleDef for RoleAdmin {
    fn allows(role: UserRole) -> bool {
        role == UserRole::Admin
    }
}

// O admin passa em todas as guardas
pub struct RoleFornecedor;
impl RoleDef for RoleFornecedor {
    fn allows(role: UserRole) -> bool {
        matches!(role, UserRole::Fornecedor | UserRole::Admin)
    }
}

pub struct RoleCliente;
impl RoleDef for RoleCliente {
    fn allows(role: UserRole) -> bool {
        matches!(role, UserRole::Cliente | UserRole::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::User;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use uuid::Uuid;

    fn user(role: UserRole) -> AuthenticatedUser {
        AuthenticatedUser(User {
            id: Uuid::new_v4(),
            email: "a@b.com".into(),
            password_hash: String::new(),
            nome: "Teste".into(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    async fn guard<R: RoleDef>(who: Option<AuthenticatedUser>) -> Result<(), StatusCode> {
        let store = I18nStore::load().unwrap();
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        if let Some(who) = who {
            parts.extensions.insert(who);
        }
        RequireRole::<R>::from_request_parts(&mut parts, &store)
            .await
            .map(|_| ())
            .map_err(|e| e.status)
    }

    #[tokio::test]
    async fn admin_passes_every_guard() {
        assert!(guard::<RoleAdmin>(Some(user(UserRole::Admin))).await.is_ok());
        assert!(guard::<RoleCliente>(Some(user(UserRole::Admin))).await.is_ok());
        assert!(guard::<RoleFornecedor>(Some(user(UserRole::Admin))).await.is_ok());
    }

    #[tokio::test]
    async fn wrong_role_is_forbidden() {
        assert_eq!(
            guard::<RoleAdmin>(Some(user(UserRole::Cliente))).await,
            Err(StatusCode::FORBIDDEN)
        );
        assert_eq!(
            guard::<RoleCliente>(Some(user(UserRole::Fornecedor))).await,
            Err(StatusCode::FORBIDDEN)
        );
    }

    #[tokio::test]
    async fn missing_user_is_unauthorized() {
        assert_eq!(guard::<RoleCliente>(None).await, Err(StatusCode::UNAUTHORIZED));
    }
}
