use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::core::infrastructure::LyricsStore;
use crate::core::LyricsService;
use crate::error::Result;
use crate::services::ServiceFactory;

/// Lazily built services shared by CLI commands.
///
/// The store is built once and handed to the pipeline, so `cache stats`
/// and `match` observe the same counters within one process.
pub struct Services {
    config: Arc<Config>,
    factory: ServiceFactory,
    store: OnceCell<Option<Arc<dyn LyricsStore>>>,
    lyrics: OnceCell<Arc<LyricsService>>,
}

impl Services {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        Self {
            factory: ServiceFactory::new(config.clone()),
            config,
            store: OnceCell::new(),
            lyrics: OnceCell::new(),
        }
    }

    pub fn config(&self) -> Arc<Config> {
        self.config.clone()
    }

    pub async fn store(&self) -> Result<Option<Arc<dyn LyricsStore>>> {
        let store = self
            .store
            .get_or_try_init(|| async { self.factory.create_store() })
            .await?;

        Ok(store.clone())
    }

    pub async fn lyrics(&self) -> Result<Arc<LyricsService>> {
        let lyrics = self
            .lyrics
            .get_or_try_init(|| async {
                let store = self.store().await?;
                Ok::<_, crate::error::LyricSyncError>(Arc::new(self.factory.create_lyrics_service(store)?))
            })
            .await?;

        Ok(lyrics.clone())
    }
}
