//! Core records for Substats

pub mod invoice;
pub mod snapshot;
pub mod subscription;
