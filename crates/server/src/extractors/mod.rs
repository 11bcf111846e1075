pub mod admin_actor;
pub mod validation_extractor;
