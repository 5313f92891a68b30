mod http_store;
mod local_store;
mod mock_store;

pub use http_store::HttpAttachmentClient;
pub use local_store::LocalAttachmentStore;
pub use mock_store::MockAttachmentStore;
