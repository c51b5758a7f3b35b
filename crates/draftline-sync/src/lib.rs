pub mod dir;
pub mod gateway;
pub mod http;
pub mod recovery;
pub mod scheduler;
pub mod session;

pub use dir::DirDraftGateway;
pub use gateway::{
    CollectGateway, GatewayError, RemoteDraftGateway, RemoteDraftReceipt, RemoteDraftRecord,
};
pub use http::HttpDraftGateway;
pub use recovery::{RecoveryController, RecoveryDecision};
pub use scheduler::{FlushReason, SyncScheduler};
pub use session::{DraftSession, FinalizeOutcome};
