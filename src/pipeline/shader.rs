//! Offline shader validation
//!
//! wgpu reports WGSL errors through its uncaptured error handler, which
//! panics by default. Running naga first turns a bad shader into a
//! [`BackendError::ShaderCreationFailed`] carrying the full diagnostic.

use crate::backend::traits::{BackendError, BackendResult};
use naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};

/// Parsed and validated shader module
#[derive(Debug)]
pub struct ValidatedShader {
    pub module: naga::Module,
    pub info: ModuleInfo,
}

impl ValidatedShader {
    /// Entry point names with their stage
    pub fn entry_points(&self) -> Vec<(String, naga::ShaderStage)> {
        self.module
            .entry_points
            .iter()
            .map(|ep| (ep.name.clone(), ep.stage))
            .collect()
    }

    /// Number of `@location` outputs written by a fragment entry point
    pub fn fragment_output_count(&self, entry_point: &str) -> Option<usize> {
        let ep = self
            .module
            .entry_points
            .iter()
            .find(|ep| ep.name == entry_point && ep.stage == naga::ShaderStage::Fragment)?;
        let result = ep.function.result.as_ref()?;

        match &self.module.types[result.ty].inner {
            naga::TypeInner::Struct { members, .. } => Some(
                members
                    .iter()
                    .filter(|m| matches!(m.binding, Some(naga::Binding::Location { .. })))
                    .count(),
            ),
            _ => Some(usize::from(matches!(
                result.binding,
                Some(naga::Binding::Location { .. })
            ))),
        }
    }

    /// Emit SPIR-V words for the module
    pub fn to_spirv(&self) -> BackendResult<Vec<u32>> {
        naga::back::spv::write_vec(
            &self.module,
            &self.info,
            &naga::back::spv::Options::default(),
            None,
        )
        .map_err(|e| BackendError::ShaderCreationFailed(format!("SPIR-V output: {e}")))
    }
}

/// Parse and validate a WGSL source
pub fn validate(source: &str) -> BackendResult<ValidatedShader> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| BackendError::ShaderCreationFailed(e.emit_to_string(source)))?;

    let info = Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| BackendError::ShaderCreationFailed(e.emit_to_string(source)))?;

    Ok(ValidatedShader { module, info })
}

/// Validate WGSL and translate it to SPIR-V
pub fn compile_spirv(source: &str) -> BackendResult<Vec<u32>> {
    validate(source)?.to_spirv()
}
