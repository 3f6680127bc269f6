//! File Attachment
//!
//! Validates a document, extracts its text and keeps it as context for the
//! following turns until cleared or replaced. Checks run in a fixed order so
//! an oversized file is rejected from metadata alone, before any read:
//!
//! 1. not an existing regular file → `NotFound`
//! 2. larger than the ceiling → `TooLarge`
//! 3. extension not allowed → `UnsupportedType`
//! 4. read / extraction error → `ExtractionFailed`

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::AttachmentConfig;
use crate::constants::attachment::{ALLOWED_EXTENSIONS, BYTES_PER_MIB};
use crate::types::{ChatError, Result, word_count};

// =============================================================================
// Extraction
// =============================================================================

/// Text extraction for binary document formats
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String>;
}

/// PDF text via `pdf-extract`, run on the blocking pool
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || pdf_extract::extract_text(&path))
            .await
            .map_err(|e| ChatError::ExtractionFailed(format!("extraction task failed: {}", e)))?
            .map_err(|e| ChatError::ExtractionFailed(e.to_string()))
    }
}

// =============================================================================
// State
// =============================================================================

/// Current attachment; both fields empty means none
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentState {
    pub file_name: String,
    pub extracted_text: String,
}

impl AttachmentState {
    pub fn is_active(&self) -> bool {
        !self.file_name.is_empty()
    }
}

pub struct FileAttachment {
    state: AttachmentState,
    max_file_bytes: u64,
    long_document_words: usize,
    extractor: Arc<dyn TextExtractor>,
}

impl std::fmt::Debug for FileAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAttachment")
            .field("file_name", &self.state.file_name)
            .field("text_len", &self.state.extracted_text.len())
            .field("max_file_bytes", &self.max_file_bytes)
            .finish()
    }
}

impl Default for FileAttachment {
    fn default() -> Self {
        Self::new(&AttachmentConfig::default())
    }
}

impl FileAttachment {
    pub fn new(config: &AttachmentConfig) -> Self {
        Self::with_extractor(config, Arc::new(PdfExtractor))
    }

    pub fn with_extractor(config: &AttachmentConfig, extractor: Arc<dyn TextExtractor>) -> Self {
        Self {
            state: AttachmentState::default(),
            max_file_bytes: config.max_file_bytes,
            long_document_words: config.long_document_words,
            extractor,
        }
    }

    /// Load `path` as the active attachment, replacing any previous one.
    ///
    /// On failure the state is left empty.
    pub async fn attach(&mut self, path: &Path) -> Result<String> {
        match self.load(path).await {
            Ok(state) => {
                info!(
                    "Attached {} ({} words)",
                    state.file_name,
                    word_count(&state.extracted_text)
                );
                let confirmation = format!("File '{}' loaded.", state.file_name);
                self.state = state;
                Ok(confirmation)
            }
            Err(e) => {
                self.clear();
                Err(e)
            }
        }
    }

    async fn load(&self, path: &Path) -> Result<AttachmentState> {
        let not_found = || ChatError::NotFound {
            path: path.display().to_string(),
        };

        let metadata = tokio::fs::metadata(path).await.map_err(|_| not_found())?;
        if !metadata.is_file() {
            return Err(not_found());
        }

        if metadata.len() > self.max_file_bytes {
            return Err(ChatError::TooLarge {
                size_mb: metadata.len() / BYTES_PER_MIB,
                max_mb: self.max_file_bytes / BYTES_PER_MIB,
            });
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let text = match extension.as_str() {
            "pdf" => {
                let text = self.extractor.extract(path).await?;
                self.with_length_warning(text)
            }
            "txt" | "md" | "json" => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| ChatError::ExtractionFailed(e.to_string()))?;
                String::from_utf8(bytes)
                    .map_err(|e| ChatError::ExtractionFailed(format!("not valid UTF-8: {}", e)))?
            }
            _ => {
                return Err(ChatError::UnsupportedType {
                    extension: if extension.is_empty() {
                        "(none)".to_string()
                    } else {
                        extension
                    },
                    supported: ALLOWED_EXTENSIONS.join(", "),
                });
            }
        };

        if text.is_empty() {
            return Err(ChatError::ExtractionFailed(
                "the document contains no text".to_string(),
            ));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!("Extracted {} bytes of text from {}", text.len(), file_name);

        Ok(AttachmentState {
            file_name,
            extracted_text: text,
        })
    }

    fn with_length_warning(&self, text: String) -> String {
        let words = word_count(&text);
        if words > self.long_document_words {
            format!(
                "[WARNING: This PDF is very long ({} words). The model may not be able to process all of it.]\n\n{}",
                words, text
            )
        } else {
            text
        }
    }

    /// Drop the active attachment. Idempotent.
    pub fn clear(&mut self) {
        self.state = AttachmentState::default();
    }

    /// Active file name, or `""` when none
    pub fn current_file_name(&self) -> &str {
        &self.state.file_name
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn state(&self) -> &AttachmentState {
        &self.state
    }

    /// Prefix `user_text` with the attachment context, if any
    pub fn context_prefix(&self, user_text: &str) -> String {
        if self.is_active() {
            format!(
                "[File: {}]\n\n{}\n\n---\n\n{}",
                self.state.file_name, self.state.extracted_text, user_text
            )
        } else {
            user_text.to_string()
        }
    }
}
