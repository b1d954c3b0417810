mod alert;
mod navigator;
mod token_store;
mod transport;

pub use alert::*;
pub use navigator::*;
pub use token_store::*;
pub use transport::*;
