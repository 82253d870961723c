pub mod gemini;
pub mod offline;
pub mod pipeline;
pub mod provider;
pub mod report;
pub mod resolver;
pub mod storage;

pub use gemini::GeminiProvider;
pub use offline::OfflineProvider;
pub use pipeline::{InspectionOutcome, InspectionPipeline};
pub use provider::AnalysisProvider;
pub use resolver::{resolve, Resolved};
pub use storage::{BlobStore, LocalStore};
