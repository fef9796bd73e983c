pub mod env;
pub mod media;
pub mod settings;
