// promptshelf shared type definitions
// Each submodule defines types used across the engagement layer.

pub mod bookmark;
pub mod entity;
pub mod errors;
pub mod like;
pub mod session;
pub mod settings;
pub mod trending;
