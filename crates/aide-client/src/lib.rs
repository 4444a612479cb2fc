pub mod auth;
pub mod error;
pub mod protocol;
pub mod rest;
pub mod socket;

pub use auth::StaticToken;
pub use auth::TokenProvider;
pub use error::ClientError;
pub use error::Result;
pub use rest::ApiClient;
pub use socket::ChatSocket;
