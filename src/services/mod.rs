//! 业务能力层（Services）
//!
//! - `ArtifactCorrelator` - 找出新生成的文件并归档
//! - `DiagnosticSink` - 失败现场截图与记录

pub mod artifact_correlator;
pub mod diagnostics;

pub use artifact_correlator::{artifact_file_name, ArtifactCorrelator, InboxSnapshot};
pub use diagnostics::DiagnosticSink;
