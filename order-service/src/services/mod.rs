pub mod crypto;
pub mod gateway;
pub mod orchestrator;

pub use crypto::FieldCipher;
pub use gateway::{CatalogGateway, IdentityGateway};
pub use orchestrator::{Orchestrator, ValidatedOrder};
