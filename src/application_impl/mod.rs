mod token_store_memory;
mod transport_fake;
mod ui_fake;
mod ui_logging;

pub use token_store_memory::*;
pub use transport_fake::*;
pub use ui_fake::*;
pub use ui_logging::*;
