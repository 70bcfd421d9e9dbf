pub mod pagination;
pub mod prediction;
