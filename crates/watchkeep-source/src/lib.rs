pub mod error;
pub mod store;
pub mod traits;

pub use error::SourceError;
pub use store::EnvelopeStore;
pub use traits::CatalogSource;
