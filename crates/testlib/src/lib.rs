pub mod protocol;
pub mod tokens;
