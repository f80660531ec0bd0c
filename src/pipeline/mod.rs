//! The document pipeline: state machine, orchestration, OCR dispatch and
//! result assembly.

pub mod assemble;
pub mod orchestrator;
pub mod recognize;
pub mod state;

pub use assemble::ResultAssembler;
pub use orchestrator::{DocumentPipeline, DocumentPipelineBuilder};
pub use recognize::{OcrOutcome, recognize_with_retry};
pub use state::{PipelineState, StateMachine};
