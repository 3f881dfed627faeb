pub mod account;
pub mod second_factor;

pub use account::{Account, SafeAccount};
pub use second_factor::{RecoveryCode, SecondFactor};
