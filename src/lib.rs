// VideoFifo Rust 엔진
// 디코더와 재생 소비자 사이의 타임스탬프 정렬 프레임 버퍼 + 재활용 프로토콜

pub mod ffi;
pub mod playback;
pub mod video;

// FFI 함수들을 최상위에서 재export
pub use ffi::*;
pub use playback::{FramePrefetcher, FrameSource, PrefetchConfig};
pub use video::{FrameImage, FrameSize, PixelFormat, TimedFrame, VideoFifo, VideoStreamSettings};

/// env_logger 초기화 (RUST_LOG 우선, 없으면 warn / debug_log 피처 시 debug)
/// 이미 초기화되어 있으면 무시
pub fn init_logging() {
    let default_level = if cfg!(feature = "debug_log") { "debug" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(default_level);
    if env_logger::Builder::from_env(env).try_init().is_ok() {
        log::debug!("logger initialized (default level: {})", default_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        assert_eq!(video_fifo_init_logging(), ErrorCode::Success as i32);
    }
}
