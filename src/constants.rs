//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Routing constants
pub mod routing {
    /// Stems that mark a message as analysis intent, in match order.
    ///
    /// Matching is substring containment on the lower-cased message, so
    /// inflected forms ("wörtern", "längsten") match too.
    pub const TRIGGER_STEMS: &[&str] = &[
        // analysis
        "analysier",
        "analyse",
        "analysiere",
        // text metrics
        "wörter",
        "wort",
        "zeichen",
        "text",
        "buchstaben",
        // length / size
        "länge",
        "lang",
        "wie lang",
        "wie gross",
        "wie groß",
        "größe",
        // counting
        "zähle",
        "zähl",
        "gezählt",
        "anzahl",
        // measuring
        "messe",
        "mess",
        "ermittle",
        "bestimme",
        // documents / files
        "dokument",
        "datei",
        "lies",
        "lese",
        "liest",
        "öffne",
        "inhalt",
        // checking
        "prüfe",
        "prüf",
        "überprüfe",
        "check",
    ];

    /// Characters of a message shown in routing log lines
    pub const LOG_PREVIEW_CHARS: usize = 50;
}

/// Attachment constants
pub mod attachment {
    /// Maximum attachment size (4 MiB)
    pub const MAX_FILE_BYTES: u64 = 4 * 1024 * 1024;

    /// Bytes per MiB, for size reporting
    pub const BYTES_PER_MIB: u64 = 1024 * 1024;

    /// Extracted documents above this word count get a warning banner
    pub const LONG_DOCUMENT_WORDS: usize = 3000;

    /// Allowed extensions (lower-case, without dot)
    pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "txt", "md", "json"];
}

/// Budget constants
pub mod budget {
    /// Conversational step table: (maximum words, response ceiling)
    pub const CONVERSATIONAL_STEPS: &[(usize, u32)] =
        &[(5, 20), (15, 80), (50, 200), (500, 400)];

    /// Conversational ceiling above the last step
    pub const CONVERSATIONAL_FALLBACK: u32 = 800;

    /// Analytical step table: (maximum words, response ceiling)
    pub const ANALYTICAL_STEPS: &[(usize, u32)] = &[
        (10, 150),
        (30, 350),
        (100, 600),
        (500, 1200),
        (2000, 2000),
    ];

    /// Analytical ceiling above the last step
    pub const ANALYTICAL_FALLBACK: u32 = 3000;

    /// Conversational temperature (balanced)
    pub const CONVERSATIONAL_TEMPERATURE: f32 = 0.5;

    /// Analytical temperature (precise, low variance)
    pub const ANALYTICAL_TEMPERATURE: f32 = 0.3;
}

/// Fixed texts used by the routing core
pub mod text {
    /// Substituted when a backend returns no content
    pub const NO_ANSWER_PLACEHOLDER: &str = "no answer received";

    /// Instructions used when no conversational instructions file exists
    pub const DEFAULT_CONVERSATIONAL_INSTRUCTIONS: &str =
        "You are a friendly chat assistant. Keep answers short and natural.";

    /// Instructions used when no analytical instructions file exists
    pub const DEFAULT_ANALYTICAL_INSTRUCTIONS: &str = "You are a document analysis specialist. \
         ALWAYS use the available tools for precise analysis.";
}

/// Tool-calling constants
pub mod tools {
    /// Maximum tool-call rounds before the last answer is returned as-is
    pub const MAX_TOOL_ROUNDS: usize = 5;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

    /// Default local model server (OpenAI-compatible endpoint)
    pub const DEFAULT_OPENAI_BASE: &str = "http://localhost:11434/v1";

    /// Default local model server (native Ollama endpoint)
    pub const DEFAULT_OLLAMA_BASE: &str = "http://localhost:11434";
}

/// Default model identifiers per role
pub mod models {
    pub const CONVERSATIONAL: &str = "phi3:mini";
    pub const ANALYTICAL: &str = "qwen2.5:7b";
}
