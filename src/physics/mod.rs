// src/physics/mod.rs
pub mod operations;
