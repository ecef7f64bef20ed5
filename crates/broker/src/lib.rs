pub mod controller;
mod lifecycle;
pub mod login;
pub mod store_factory;
pub mod validator;

#[cfg(test)]
mod testutil;

pub use controller::{AuthenticationController, Principal};
pub use login::{LoginRequest, LoginResponse, ReturnCode, handle_login};
pub use store_factory::create_secret_store;
pub use validator::CredentialValidator;
