pub mod config;
pub mod error;
pub mod record;
pub mod status;
pub mod types;

pub use config::{AutosaveOptions, DraftlineConfig};
pub use error::DraftError;
pub use record::{decode_record, encode_record, peek_key, CachedDraftRecord, RECORD_VERSION};
pub use status::{SaveState, SaveStatus};
pub use types::*;
