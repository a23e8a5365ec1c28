pub mod capa;
pub mod overlay;
