/// Token source abstraction
///
/// The cache only needs "give me a fresh token"; how it is obtained is up to the source.

use crate::cache::token::IssuedToken;
use crate::error::Result;

pub trait FetchToken: Send + Sync + 'static {
    fn fetch_token(&self) -> impl std::future::Future<Output = Result<IssuedToken>> + Send;
}
