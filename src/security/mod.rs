//! Security utilities for the relay endpoints

pub mod origin;

pub use origin::OriginPolicy;
