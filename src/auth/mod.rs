pub mod cookies;
pub mod password;
pub mod token;

pub use token::{sign_token, verify_token, TokenKind};
