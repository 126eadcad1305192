pub use crate::EmbersPlugin;

pub use crate::asset::{
    Curve, CurveKey, CurveSet, CurveType, EmitterAsset, EmitterSettings, ParticleTemplate,
    SimulationMode, SortMode,
};
pub use crate::emitter::{Emitter, EmitterCamera, EmitterError, ProcessorCaps};
pub use crate::lighting::{DirectionalLightSample, SceneLighting};
pub use crate::runtime::{
    EmitterRuntime, EmitterSetupError, ParticleCameraTarget, ParticleEmitter3D, ParticleLighting,
};
