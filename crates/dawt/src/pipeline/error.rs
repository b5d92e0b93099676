use crate::language::Language;

/// Recoverable problems recorded during a run. They never change the
/// job outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineWarning {
    TranslationFailed { language: Language, error: String },
    TranslationUnsupported { language: Language },
}
