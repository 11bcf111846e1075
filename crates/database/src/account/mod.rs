pub mod document;
pub mod memory;
pub mod model;
pub mod repository;
pub mod statistics;

#[cfg(test)]
mod tests;
