use std::collections::HashMap;

use lensapi::{
    InterpretRequest, Interpretation, ServiceClient, ServiceError, Variation, VariationRequest,
    VariationSet,
};
use tracing::debug;

use crate::params::NumericParam;
use crate::selection::LineSelection;

/// The two remote calls a session makes.
pub trait LensService {
    fn interpret(&self, request: &InterpretRequest) -> Result<Interpretation, ServiceError>;
    fn variations(&self, request: &VariationRequest) -> Result<VariationSet, ServiceError>;
}

impl LensService for ServiceClient {
    fn interpret(&self, request: &InterpretRequest) -> Result<Interpretation, ServiceError> {
        ServiceClient::interpret(self, request)
    }

    fn variations(&self, request: &VariationRequest) -> Result<VariationSet, ServiceError> {
        ServiceClient::variations(self, request)
    }
}

/// Shader text plus the interactive state layered on top of it.
#[derive(Debug, Default)]
pub struct LensSession {
    shader: String,
    selection: LineSelection,
    interpretation: Option<Interpretation>,
    cache: HashMap<String, Interpretation>,
    active_param: Option<NumericParam>,
    variations: Option<VariationSet>,
}

impl LensSession {
    pub fn new(shader: impl Into<String>) -> Self {
        Self {
            shader: shader.into(),
            ..Self::default()
        }
    }

    pub fn shader(&self) -> &str {
        &self.shader
    }

    pub fn lines(&self) -> Vec<&str> {
        self.shader.split('\n').collect()
    }

    pub fn selection(&self) -> &LineSelection {
        &self.selection
    }

    #[cfg(test)]
    pub fn interpretation(&self) -> Option<&Interpretation> {
        self.interpretation.as_ref()
    }

    pub fn active_param(&self) -> Option<&NumericParam> {
        self.active_param.as_ref()
    }

    #[cfg(test)]
    pub fn variations(&self) -> Option<&VariationSet> {
        self.variations.as_ref()
    }

    #[cfg(test)]
    pub fn cached_explanations(&self) -> usize {
        self.cache.len()
    }

    /// Click on a line; `extend` is shift-click.
    pub fn click_line(&mut self, index: usize, extend: bool) {
        if extend {
            self.selection.extend_to(index);
        } else {
            self.selection.toggle(index);
        }
        self.interpretation = None;
    }

    #[cfg(test)]
    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.interpretation = None;
    }

    /// Explains the current selection, reusing a cached answer for the same
    /// set of lines. Returns `Ok(None)` when nothing is selected.
    pub fn explain(
        &mut self,
        service: &impl LensService,
    ) -> Result<Option<&Interpretation>, ServiceError> {
        if self.selection.is_empty() {
            return Ok(None);
        }
        let key = self.selection.cache_key();
        let interpretation = match self.cache.get(&key) {
            Some(hit) => {
                debug!(lines = %key, "explanation cache hit");
                hit.clone()
            }
            None => {
                let request =
                    InterpretRequest::for_lines(&self.shader, self.selection.sorted_indices());
                let fresh = service.interpret(&request)?;
                self.cache.insert(key, fresh.clone());
                fresh
            }
        };
        Ok(Some(&*self.interpretation.insert(interpretation)))
    }

    /// Asks for alternatives to `param` and makes it the active parameter.
    pub fn request_variations(
        &mut self,
        service: &impl LensService,
        param: NumericParam,
    ) -> Result<&VariationSet, ServiceError> {
        let context = self
            .shader
            .split('\n')
            .nth(param.line)
            .unwrap_or_default()
            .to_string();
        let request = VariationRequest {
            full_shader: self.shader.clone(),
            param_value: param.value.clone(),
            param_context: context,
            line_index: param.line,
        };
        let set = service.variations(&request)?;
        self.active_param = Some(param);
        Ok(&*self.variations.insert(set))
    }

    /// Shader text with the active parameter's first occurrence swapped for
    /// `value`, without touching the session.
    pub fn variation_preview(&self, value: &str) -> Option<String> {
        let param = self.active_param.as_ref()?;
        Some(self.shader.replacen(&param.value, value, 1))
    }

    /// Adopts a variation: the first occurrence of the active literal is
    /// replaced and all per-shader state is reset. Returns false when no
    /// parameter is active.
    pub fn apply_variation(&mut self, variation: &Variation) -> bool {
        let Some(shader) = self.variation_preview(&variation.value) else {
            return false;
        };
        debug!(label = %variation.label, value = %variation.value, "applying variation");
        self.shader = shader;
        self.variations = None;
        self.active_param = None;
        self.selection.clear();
        self.interpretation = None;
        self.cache.clear();
        true
    }
}
