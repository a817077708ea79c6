#![allow(clippy::new_without_default, clippy::manual_range_contains)]

pub mod q_shared;
pub mod common;
pub mod cvar;
pub mod cmd;
pub mod files;
