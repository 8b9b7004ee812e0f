pub mod token;
pub mod token_cache;

pub use token::{IssuedToken, Token};
pub use token_cache::TokenCache;
