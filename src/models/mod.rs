pub mod auth;
pub mod catalog;
pub mod cotacao;
pub mod obra;
