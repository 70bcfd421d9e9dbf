pub mod endpoints;
pub mod normalize;
pub mod types;
