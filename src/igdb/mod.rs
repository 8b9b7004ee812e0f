pub mod client;
pub mod query;

pub use client::IgdbClient;
pub use query::Query;
