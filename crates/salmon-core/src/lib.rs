pub mod config;
pub mod error;
pub mod types;

pub use error::{SalmonError, SalmonResult};
pub use types::{EncryptionFormat, EncryptionMode, ProviderType};
