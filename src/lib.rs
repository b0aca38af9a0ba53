pub mod annotate;
pub mod detection;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod params;
pub mod pipeline;
pub mod publish;
pub mod segments;

pub use detection::{Detection, Detector, HoughSegmentDetector};
pub use dispatch::FrameDispatcher;
pub use error::PipelineError;
pub use models::{
    AnnotatedFrame, ColorClass, Diagnostics, EncodedFrame, NormalizedSegment, RawSegment,
    SegmentList,
};
pub use params::{ParameterStore, PipelineParams};
pub use pipeline::FramePipeline;
pub use publish::{ChannelPublisher, Publisher};
pub use segments::SegmentEncoder;
