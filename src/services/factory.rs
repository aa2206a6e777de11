use std::sync::Arc;
use std::time::Duration;
use reqwest::Client;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::infrastructure::{HybridStore, LyricsStore};
use crate::core::lyrics::Cleaner;
use crate::core::services::{
    Enricher, HttpTranslator, KugouProvider, NeteaseProvider, Provider, QqMusicProvider, Translator,
    UnifiedClientRegistry, UnifiedProvider,
};
use crate::core::LyricsService;
use crate::error::{NetworkError, Result};

const USER_AGENT: &str = concat!("lyricsync/", env!("CARGO_PKG_VERSION"));

/// Builds every service from one configuration
pub struct ServiceFactory {
    config: Arc<Config>,
}

impl ServiceFactory {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// One pooled client shared by the legacy providers and collaborators
    pub fn create_http_client(&self) -> Result<Client> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(NetworkError::Http)?;

        Ok(client)
    }

    /// Legacy providers in the order they are searched
    pub fn create_providers(&self, client: &Client) -> Vec<Arc<dyn Provider>> {
        let mut providers: Vec<Arc<dyn Provider>> = Vec::new();

        if self.config.enable_qq {
            providers.push(Arc::new(QqMusicProvider::new(client.clone())));
        } else {
            info!("Provider disabled: QQ Music");
        }
        if self.config.enable_kugou {
            providers.push(Arc::new(KugouProvider::new(client.clone())));
        } else {
            info!("Provider disabled: Kugou");
        }
        if self.config.enable_netease {
            providers.push(Arc::new(NeteaseProvider::new(client.clone())));
        } else {
            info!("Provider disabled: Netease");
        }

        providers
    }

    pub fn create_unified_providers(&self) -> Vec<Arc<dyn Provider>> {
        let registry = Arc::new(UnifiedClientRegistry::new(Duration::from_secs(
            self.config.fetch_timeout_secs,
        )));
        UnifiedProvider::all(registry)
            .into_iter()
            .map(|provider| Arc::new(provider) as Arc<dyn Provider>)
            .collect()
    }

    /// `None` when caching is switched off
    pub fn create_store(&self) -> Result<Option<Arc<dyn LyricsStore>>> {
        if !self.config.cache_enabled {
            info!("Lyrics cache disabled");
            return Ok(None);
        }

        let store = HybridStore::new(
            self.config.cache_dir.clone(),
            self.config.redis_url.as_deref(),
            self.config.cache_ttl_secs,
        )?;
        Ok(Some(Arc::new(store)))
    }

    pub fn create_enricher(&self, client: &Client) -> Enricher {
        Enricher::new(
            client.clone(),
            self.config.enrich_key.clone(),
            self.config.enrich_url.clone(),
            Some(self.config.enrich_model.clone()),
            &self.config.enrich_target_lang,
        )
    }

    pub fn create_translator(&self, client: &Client) -> Option<Arc<dyn Translator>> {
        match &self.config.translate_url {
            Some(url) => Some(Arc::new(HttpTranslator::new(client.clone(), url))),
            None => {
                warn!("No translation endpoint configured, romaji and English fallback strategies disabled");
                None
            }
        }
    }

    /// The fully wired lyric pipeline, with the store it was given
    pub fn create_lyrics_service(&self, store: Option<Arc<dyn LyricsStore>>) -> Result<LyricsService> {
        let client = self.create_http_client()?;

        let mut service = LyricsService::new(self.create_providers(&client), self.config.pipeline_settings())
            .with_unified_providers(self.create_unified_providers())
            .with_enricher(Arc::new(self.create_enricher(&client)))
            .with_cleaner(Cleaner::new(self.config.cleaner.clone()));

        if let Some(store) = store {
            service = service.with_store(store);
        }
        if let Some(translator) = self.create_translator(&client) {
            service = service.with_translator(translator);
        }

        Ok(service)
    }
}
