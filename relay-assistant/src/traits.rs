use crate::client::AssistantsClient;
use crate::error::Result;
use crate::types::Run;
use async_trait::async_trait;

/// Backend operations the completion orchestrator is written against.
///
/// `AssistantsClient` is the production implementation; tests substitute
/// scripted fakes.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    async fn create_thread(&self) -> Result<String>;

    async fn append_user_message(&self, thread_id: &str, content: &str) -> Result<()>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run>;

    /// Newest message text on the thread, if any.
    async fn latest_message_text(&self, thread_id: &str) -> Result<Option<String>>;
}

#[async_trait]
impl AssistantBackend for AssistantsClient {
    async fn create_thread(&self) -> Result<String> {
        AssistantsClient::create_thread(self).await
    }

    async fn append_user_message(&self, thread_id: &str, content: &str) -> Result<()> {
        AssistantsClient::append_user_message(self, thread_id, content).await
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run> {
        AssistantsClient::create_run(self, thread_id, assistant_id).await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run> {
        AssistantsClient::retrieve_run(self, thread_id, run_id).await
    }

    async fn latest_message_text(&self, thread_id: &str) -> Result<Option<String>> {
        AssistantsClient::latest_message_text(self, thread_id).await
    }
}
