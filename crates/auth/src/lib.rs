mod api;
pub mod clientside;
pub mod handler;
pub mod serverside;
pub mod standalone;

#[cfg(test)]
mod testutil;

pub use clientside::ClientSideAuthHandler;
pub use handler::{AuthHandler, SessionAccess, create_auth_handler};
pub use serverside::ServerSideAuthHandler;
pub use standalone::StandaloneAuthHandler;
