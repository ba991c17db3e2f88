pub mod actor;
pub mod assets;
pub mod health;
pub mod owners;
pub mod webhooks;
