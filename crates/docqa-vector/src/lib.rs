pub mod builder;
pub mod index;
pub mod retriever;
pub mod schema;
pub mod store;
pub mod table;

pub use builder::{IndexBuildError, IndexBuilder, Pacer, ThreadPacer};
pub use index::{VectorIndex, VectorRecord};
pub use retriever::{QueryHandle, Retriever};
pub use store::{IndexStore, StoreInfo};
