//! In-memory graphics backend for behavioural tests.
//!
//! Stages are compiled through the real GLSL front end so failures are
//! genuine; everything else is bookkeeping the tests can inspect.

use std::cell::RefCell;
use std::rc::Rc;

use crate::backend::{DrawSurface, GraphicsContext};
use crate::compile::validate_glsl;
use crate::types::{ContextApi, FrameUniforms, PixelSize, StageKind};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct DrawCall {
    pub program: u64,
    pub viewport: PixelSize,
    pub uniforms: FrameUniforms,
}

#[derive(Debug, Default)]
struct RecordingState {
    apis: Vec<ContextApi>,
    size: PixelSize,
    draws: Vec<DrawCall>,
    live_stages: usize,
    live_programs: Vec<u64>,
    programs_created: u64,
    quads: usize,
    fail_link: bool,
}

/// Shared view onto what a recording surface and its context did.
#[derive(Debug, Clone)]
pub(crate) struct RecordingProbe {
    state: Rc<RefCell<RecordingState>>,
}

impl RecordingProbe {
    pub fn new(size: PixelSize) -> Self {
        Self::with_apis(size, &ContextApi::PREFERENCE)
    }

    pub fn with_apis(size: PixelSize, apis: &[ContextApi]) -> Self {
        Self {
            state: Rc::new(RefCell::new(RecordingState {
                apis: apis.to_vec(),
                size,
                ..RecordingState::default()
            })),
        }
    }

    pub fn surface(&self) -> RecordingSurface {
        RecordingSurface {
            state: Rc::clone(&self.state),
        }
    }

    pub fn draws(&self) -> Vec<DrawCall> {
        self.state.borrow().draws.clone()
    }

    pub fn live_stages(&self) -> usize {
        self.state.borrow().live_stages
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().live_programs.len()
    }

    pub fn live_program_ids(&self) -> Vec<u64> {
        self.state.borrow().live_programs.clone()
    }

    pub fn programs_created(&self) -> u64 {
        self.state.borrow().programs_created
    }

    pub fn quads(&self) -> usize {
        self.state.borrow().quads
    }

    pub fn set_fail_link(&self, fail: bool) {
        self.state.borrow_mut().fail_link = fail;
    }
}

pub(crate) struct RecordingSurface {
    state: Rc<RefCell<RecordingState>>,
}

impl DrawSurface for RecordingSurface {
    type Context = RecordingContext;

    fn pixel_size(&self) -> PixelSize {
        self.state.borrow().size
    }

    fn resize(&mut self, size: PixelSize) {
        self.state.borrow_mut().size = size;
    }

    fn acquire_context(&mut self, api: ContextApi) -> Result<RecordingContext, String> {
        if self.state.borrow().apis.contains(&api) {
            Ok(RecordingContext {
                api,
                state: Rc::clone(&self.state),
            })
        } else {
            Err(format!("{api} API disabled"))
        }
    }
}

pub(crate) struct RecordingContext {
    api: ContextApi,
    state: Rc<RefCell<RecordingState>>,
}

#[derive(Debug)]
pub(crate) struct RecordingStage {
    _kind: StageKind,
}

#[derive(Debug)]
pub(crate) struct RecordingQuad {
    _vertices: [[f32; 2]; 4],
}

#[derive(Debug)]
pub(crate) struct RecordingProgram {
    id: u64,
}

impl GraphicsContext for RecordingContext {
    type Stage = RecordingStage;
    type Program = RecordingProgram;
    type Buffer = RecordingQuad;

    fn api(&self) -> ContextApi {
        self.api
    }

    fn create_quad(&mut self, vertices: &[[f32; 2]; 4]) -> RecordingQuad {
        self.state.borrow_mut().quads += 1;
        RecordingQuad {
            _vertices: *vertices,
        }
    }

    fn compile_stage(&mut self, kind: StageKind, source: &str) -> Result<RecordingStage, String> {
        validate_glsl(kind, source)?;
        self.state.borrow_mut().live_stages += 1;
        Ok(RecordingStage { _kind: kind })
    }

    fn release_stage(&mut self, _stage: RecordingStage) {
        self.state.borrow_mut().live_stages -= 1;
    }

    fn link_program(
        &mut self,
        _vertex: &RecordingStage,
        _fragment: &RecordingStage,
    ) -> Result<RecordingProgram, String> {
        let mut state = self.state.borrow_mut();
        if state.fail_link {
            return Err("interface mismatch between stages".to_string());
        }
        state.programs_created += 1;
        let id = state.programs_created;
        state.live_programs.push(id);
        Ok(RecordingProgram { id })
    }

    fn release_program(&mut self, program: RecordingProgram) {
        self.state
            .borrow_mut()
            .live_programs
            .retain(|id| *id != program.id);
    }

    fn draw_quad(
        &mut self,
        program: &RecordingProgram,
        _quad: &RecordingQuad,
        viewport: PixelSize,
        uniforms: &FrameUniforms,
    ) {
        self.state.borrow_mut().draws.push(DrawCall {
            program: program.id,
            viewport,
            uniforms: *uniforms,
        });
    }
}
