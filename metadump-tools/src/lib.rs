pub mod escape;
pub mod json;
