// FFI 모듈 - 호스트 애플리케이션 P/Invoke 연동

pub mod types;
pub mod video_fifo;

pub use types::ErrorCode;
pub use video_fifo::*;
