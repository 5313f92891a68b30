use std::sync::Arc;

use crate::application::ports::{AttachmentStore, CompletionClient};
use crate::presentation::config::Settings;

pub struct AppState<C, S>
where
    C: CompletionClient,
    S: AttachmentStore,
{
    pub completion_client: Arc<C>,
    pub attachment_store: Arc<S>,
    pub settings: Settings,
}

impl<C, S> AppState<C, S>
where
    C: CompletionClient,
    S: AttachmentStore,
{
    pub fn new(completion_client: Arc<C>, attachment_store: Arc<S>, settings: Settings) -> Self {
        Self {
            completion_client,
            attachment_store,
            settings,
        }
    }
}

impl<C, S> Clone for AppState<C, S>
where
    C: CompletionClient,
    S: AttachmentStore,
{
    fn clone(&self) -> Self {
        Self {
            completion_client: Arc::clone(&self.completion_client),
            attachment_store: Arc::clone(&self.attachment_store),
            settings: self.settings.clone(),
        }
    }
}
