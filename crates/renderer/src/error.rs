use thiserror::Error;

use crate::types::StageKind;

/// Failures surfaced by the renderer core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RendererError {
    /// No graphics API generation could be acquired from the surface.
    #[error("no graphics context available: {}", .reasons.join("; "))]
    ContextUnavailable { reasons: Vec<String> },
    /// One shader stage failed to compile.
    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompile { stage: StageKind, log: String },
    /// Both stages compiled but the program failed to link.
    #[error("shader program failed to link: {log}")]
    ShaderLink { log: String },
}

impl RendererError {
    pub(crate) fn compile(stage: StageKind, log: impl Into<String>) -> Self {
        RendererError::ShaderCompile {
            stage,
            log: non_empty_log(log.into()),
        }
    }

    pub(crate) fn link(log: impl Into<String>) -> Self {
        RendererError::ShaderLink {
            log: non_empty_log(log.into()),
        }
    }

    /// Driver diagnostic text for compile and link failures.
    pub fn log(&self) -> Option<&str> {
        match self {
            RendererError::ShaderCompile { log, .. } | RendererError::ShaderLink { log } => {
                Some(log)
            }
            RendererError::ContextUnavailable { .. } => None,
        }
    }
}

fn non_empty_log(log: String) -> String {
    if log.trim().is_empty() {
        "unknown error".to_string()
    } else {
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_logs_are_replaced() {
        let err = RendererError::compile(StageKind::Fragment, "  ");
        assert_eq!(err.log(), Some("unknown error"));
        assert_eq!(
            err.to_string(),
            "fragment shader failed to compile: unknown error"
        );
    }

    #[test]
    fn context_reasons_are_joined() {
        let err = RendererError::ContextUnavailable {
            reasons: vec!["modern: no adapter".into(), "legacy: no adapter".into()],
        };
        assert_eq!(
            err.to_string(),
            "no graphics context available: modern: no adapter; legacy: no adapter"
        );
        assert_eq!(err.log(), None);
    }
}
