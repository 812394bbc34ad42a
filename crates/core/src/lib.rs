pub mod adapters;
pub mod artifacts;
pub mod cleaner;
pub mod error;
pub mod filter;
pub mod llm;
pub mod metadata;
pub mod models;
pub mod pipeline;
pub mod segment;
pub mod storage;

pub use adapters::{extract_raw, SUPPORTED_EXTENSIONS};
pub use artifacts::{ArtifactStore, CSV_HEADER};
pub use cleaner::Cleaner;
pub use error::{ExtractError, LlmError, Result, StoreError};
pub use filter::{
    MeaningfulnessStrategy, SyntacticFilter, WordCountFilter, MIN_ALPHA_RATIO, MIN_TOKEN_COUNT,
};
pub use llm::{
    list_local_models, ChatMessage, ChatReply, GenerateReply, ModelServer, OllamaClient,
    TokenStream, DEFAULT_OLLAMA_URL,
};
pub use metadata::{MetadataStore, DEFAULT_CLASSIFICATION};
pub use models::{
    ArtifactEntry, DatasetRow, ExtractedUnit, ExtractionReport, FileOutcome, FileStatus,
    StorageEntry, UnitKind,
};
pub use pipeline::ExtractionPipeline;
pub use segment::{
    select_strategies, LexiconModel, PosTag, RuleSegmenter, SegmentationStrategy, Strategies,
    SyntacticSegmenter, SyntaxModel, TaggedToken,
};
pub use storage::UploadStore;
