//! Text processing shared by the transcription and translation stages.

pub mod chunker;
pub mod cleanup;
pub mod language;

pub use chunker::chunk_text;
pub use cleanup::{apply_rtl_postprocessing, clean_transcript, is_rtl_language};
pub use language::{KeywordDetector, LanguageDetector};
