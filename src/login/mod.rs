//! Email-OTP login core: challenge lifecycle, lockout policy and the
//! state machine that drives `begin_login` / `verify_otp` / `resend_otp`.

pub mod config;
pub mod crypto;
pub mod error;
pub mod lockout;
pub mod memory;
pub mod models;
pub mod repo;
pub mod service;

pub use config::LoginConfig;
pub use error::LoginError;
pub use service::LoginService;
