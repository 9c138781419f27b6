use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::Client;

use crate::ai::StoryClient;
use crate::identity::IdentityClient;
use crate::image::ImageClient;
use crate::storage::StorageClient;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Client>>,
    pub storage: Option<StorageClient>,
    pub identity: Arc<IdentityClient>,
    pub story_ai: Arc<StoryClient>,
    pub images: Arc<ImageClient>,
    /// Cap on scenes rendered at once per story request.
    pub image_concurrency: usize,
}
