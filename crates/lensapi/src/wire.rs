use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// Number of variations the service is asked to suggest.
pub const EXPECTED_VARIATIONS: usize = 3;

/// Body of `POST /interpret`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretRequest {
    pub full_shader: String,
    /// Text of each selected line, in `line_indices` order.
    pub selected_lines: Vec<String>,
    /// Zero-based, ascending.
    pub line_indices: Vec<usize>,
}

impl InterpretRequest {
    /// Builds a request from a shader and a set of zero-based line indices.
    ///
    /// Indices are sorted and deduplicated; out-of-range ones are dropped.
    pub fn for_lines(full_shader: &str, indices: impl IntoIterator<Item = usize>) -> Self {
        let lines: Vec<&str> = full_shader.split('\n').collect();
        let mut line_indices: Vec<usize> = indices
            .into_iter()
            .filter(|index| *index < lines.len())
            .collect();
        line_indices.sort_unstable();
        line_indices.dedup();
        let selected_lines = line_indices
            .iter()
            .map(|index| lines[*index].to_string())
            .collect();
        Self {
            full_shader: full_shader.to_string(),
            selected_lines,
            line_indices,
        }
    }
}

/// Response of `POST /interpret`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interpretation {
    pub explanation: String,
    /// Standalone `mainImage` program visualising the selected lines.
    pub isolation_shader: String,
}

/// Body of `POST /variations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationRequest {
    pub full_shader: String,
    pub param_value: String,
    /// The full line the literal sits on.
    pub param_context: String,
    pub line_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variation {
    pub label: String,
    pub value: String,
    pub description: String,
}

/// Response of `POST /variations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationSet {
    pub param_name: String,
    pub variations: Vec<Variation>,
}

impl VariationSet {
    pub fn check_count(&self) -> Result<(), ServiceError> {
        if self.variations.len() == EXPECTED_VARIATIONS {
            Ok(())
        } else {
            Err(ServiceError::UnexpectedVariationCount(self.variations.len()))
        }
    }
}

/// Error body either endpoint may return instead of its payload.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    pub error: String,
}
