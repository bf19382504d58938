mod core;
mod processors;
mod utils;

pub use crate::core::operation::{
    FilterKind, Operation, OperationKind, OperationRegistry, OperationSpec, ParamKind, ParamSpec, FILTER_NAMES,
};
pub use crate::core::processor::{Applied, ImageProcessor};
pub use crate::core::{
    BatchConfig, BatchResult, CancelToken, FileError, FileOutcome, FileStatus, ModelConfig, PreflightError,
    ResizeAlgorithm, SupportedFormat,
};
pub use crate::processors::{
    apply_builtin_filter, collect_image_paths, BatchJob, BatchRunner, FileOrganizer, ImageCodec, ImageHandle,
    ModelLoader, OnnxModelLoader, OnnxUpscaler, Resizer, SuperResolutionEngine, Upscaler, UPSCALE_FACTOR,
};
pub use crate::utils::{converted_path, enhanced_path, format_file_size, is_enhanced_output, is_supported_format};

pub mod prelude {
    pub use crate::{
        BatchConfig, BatchRunner, CancelToken, ImageCodec, Operation, OperationRegistry, SuperResolutionEngine,
    };
}

// Re-export commonly used types
pub use image::DynamicImage;
