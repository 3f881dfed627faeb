pub mod jwt;
pub mod keys;
pub mod two_factor;

pub use jwt::{JwtService, TokenPair};
pub use keys::KeyMaterial;
pub use two_factor::{SecondStep, TwoFactorService};
