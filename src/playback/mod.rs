// 재생 파이프라인 모듈 - VideoFifo 생산자 측 (백그라운드 프리페치)

pub mod prefetcher;

pub use prefetcher::{FramePrefetcher, FrameSource, PrefetchConfig};
