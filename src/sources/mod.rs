pub mod fetch;
pub mod oauth2;

pub use fetch::FetchToken;
pub use oauth2::OAuth2Source;
