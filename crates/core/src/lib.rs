//! Pure domain logic for the Minimuse generation platform.
//!
//! No I/O lives here: the tool catalog, typed generation inputs and
//! their validation, credit pricing, and shared error/type aliases.
//! Persistence belongs to `minimuse-db`, provider access to
//! `minimuse-provider`, and HTTP to `minimuse-api`.

pub mod error;
pub mod input;
pub mod pricing;
pub mod tool;
pub mod types;
