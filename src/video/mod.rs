// 비디오 프레임 버퍼 모듈 (디코더 → FIFO → 재생 소비자)

pub mod fifo;
pub mod image;
pub mod settings;

pub use fifo::{TimedFrame, VideoFifo};
pub use image::{FrameImage, PixelFormat};
pub use settings::{FrameSize, VideoStreamSettings};
