// imgbatch/src/processors/mod.rs
mod batch;
mod codec;
mod enhancer;
mod filters;
mod onnx;
mod organizer;
mod resizer;

pub use batch::{collect_image_paths, BatchJob, BatchRunner};
pub use codec::{ImageCodec, ImageHandle};
pub use enhancer::{ModelLoader, SuperResolutionEngine, Upscaler, UPSCALE_FACTOR};
pub use filters::apply_builtin_filter;
pub use onnx::{OnnxModelLoader, OnnxUpscaler};
pub use organizer::FileOrganizer;
pub use resizer::Resizer;
