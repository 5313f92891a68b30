mod attachment_store;
mod completion_client;

pub use attachment_store::{AttachmentFetcher, AttachmentStore, AttachmentStoreError};
pub use completion_client::{
    CompletionClient, CompletionError, CompletionMessage, CompletionRequest, FragmentStream,
};
