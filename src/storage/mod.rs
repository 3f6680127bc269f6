pub mod database;

pub use database::{
    ConversationSummary, Database, PoolConfig, SharedDatabase, StoredMessage, StoredUpload,
};
