//! One-shot service construction from a resolved [`Config`].
//!
//! Backend selection happens here and only here. The orchestrator receives
//! trait objects and cannot observe which backing was chosen, so the choice
//! can never change mid-session.

use std::sync::Arc;

use crate::core::config::{ChatBackend, Config, HistoryBackend};
use crate::error::ChatError;
use crate::history::{FileHistoryStore, HistoryStore, MemoryHistoryStore, RestHistoryStore};
use crate::transport::{ChatTransport, HttpChatTransport, MockChatTransport};

pub struct Services {
    pub transport: Arc<dyn ChatTransport>,
    pub history: Arc<dyn HistoryStore>,
}

pub fn build_services(config: &Config) -> Result<Services, ChatError> {
    let transport: Arc<dyn ChatTransport> = match config.chat_backend {
        ChatBackend::Mock => {
            tracing::info!("using mock chat transport");
            Arc::new(MockChatTransport::new())
        }
        ChatBackend::Api => Arc::new(
            HttpChatTransport::new(
                config.standard_chat_url.clone(),
                config.multi_agent_chat_url.clone(),
                config.response_mode(),
            )
            .with_timeout(config.request_timeout()),
        ),
    };

    let history: Arc<dyn HistoryStore> = match config.history_backend {
        HistoryBackend::Memory => Arc::new(MemoryHistoryStore::with_sample_data()),
        HistoryBackend::Local => {
            let dir = config.resolve_data_dir().ok_or_else(|| {
                ChatError::Storage("no data directory available on this platform".to_string())
            })?;
            Arc::new(FileHistoryStore::new(dir)?)
        }
        HistoryBackend::Remote => Arc::new(RestHistoryStore::new(config.history_url.clone())),
    };

    Ok(Services { transport, history })
}
