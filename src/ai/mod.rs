pub mod backend;
pub mod decode;
pub mod dispatcher;
pub mod normalizer;
pub mod workers_ai;

pub use backend::{
    AdvancedParams, ChunkStream, ConditionedRequest, InferenceBackend, Payload,
    UnconditionedRequest,
};
pub use decode::{decode_base64_image, decode_payload};
pub use dispatcher::{Dispatcher, GenerationPath, GenerationResult, OUTPUT_CONTENT_TYPE};
pub use normalizer::{GenerationRequest, Normalizer, style_prompt};
pub use workers_ai::{WorkersAiClient, aspect_dimensions};
