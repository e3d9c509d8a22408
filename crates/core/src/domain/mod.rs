pub mod analysis;
pub mod idea;
pub mod market;
