mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryCaseStore;
pub use record::{CaseRecord, LedgerEventRecord};
pub use traits::CaseStore;
