pub mod user_repo;
pub use user_repo::UserRepository;
pub mod catalog_repo;
pub use catalog_repo::CatalogRepository;
pub mod obra_repo;
pub use obra_repo::ObraRepository;
pub mod cotacao_repo;
pub use cotacao_repo::CotacaoRepository;
pub mod fornecedor_repo;
pub use fornecedor_repo::FornecedorRepository;
