// src/services/mod.rs

pub mod memory;
pub mod notify;
pub mod postgres;
