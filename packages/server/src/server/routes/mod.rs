// HTTP routes
pub mod health;
pub mod me;
pub mod otp;
pub mod users;

pub use health::*;
pub use me::*;
pub use otp::*;
pub use users::*;
