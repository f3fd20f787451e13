pub mod ecosystem;
pub mod market;
pub mod prediction;
pub mod show;
pub mod species;
pub mod universe;
