pub mod admin_catalog;
pub mod auth;
pub mod catalog;
pub mod cotacoes;
pub mod documents;
pub mod fornecedores;
pub mod obras;
