mod token_store_cookie;
mod transport_reqwest;

pub use token_store_cookie::*;
pub use transport_reqwest::*;
