use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::Config;
use crate::services::{
    catalog::StyleCatalog, image_store::ImageStore, providers::VisionModel, session::QuizSession,
};

/// Limits the web flow applies to each session
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub sample_size: usize,
    pub max_upload_bytes: usize,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            sample_size: config.sample_size,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<RwLock<AppStateInner>>,
    pub catalog: Arc<StyleCatalog>,
    pub store: ImageStore,
    pub model: Arc<dyn VisionModel>,
    pub settings: SessionSettings,
}

/// Inner state that can be modified
#[derive(Default)]
pub struct AppStateInner {
    pub sessions: HashMap<Uuid, QuizSession>,
}

impl AppState {
    pub fn new(
        catalog: StyleCatalog,
        store: ImageStore,
        model: Arc<dyn VisionModel>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(AppStateInner::default())),
            catalog: Arc::new(catalog),
            store,
            model,
            settings,
        }
    }
}
