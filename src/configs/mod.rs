pub mod base;
pub mod cleanup;
pub mod logging;
pub mod resolver;
pub mod server;
pub mod timeouts;

pub use base::*;
pub use cleanup::*;
pub use logging::*;
pub use resolver::*;
pub use server::*;
pub use timeouts::*;
