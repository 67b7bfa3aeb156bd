pub mod fixture;
pub mod node;
pub mod settings;
pub mod verifier;
