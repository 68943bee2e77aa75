//! tests/mod.rs
//! Tests de integración de servicios sobre SQLite en memoria.

mod message_tests;
mod support;
