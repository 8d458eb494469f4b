pub mod auth;
pub mod catalog_filter;
pub mod catalog_graph;
pub mod catalog_service;
pub mod cotacao_service;
pub mod document_service;
pub mod eligibility;
pub mod fornecedor_service;
pub mod obra_service;
