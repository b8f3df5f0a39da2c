//! FramePrefetcher - 백그라운드 디코딩으로 VideoFifo 채우기
//!
//! 아키텍처:
//! - 별도 스레드가 FrameSource(디코더)에서 프레임을 받아 VideoFifo에 push
//! - 디코더는 재활용된 이미지에 덮어씀 (소비자가 지나간 프레임의 픽셀 버퍼)
//! - 재활용할 프레임이 없고 FIFO가 max_buffered_frames 이상이면 대기 (back-pressure)
//! - 소비자(렌더/transport)는 VideoFifo::get_video_frame으로 즉시 조회

use crate::video::{FrameImage, VideoFifo};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// 기본 선행 버퍼 프레임 수
pub const DEFAULT_MAX_BUFFERED_FRAMES: usize = 16;

/// back-pressure 대기 간격
pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(10);

/// 연속 디코딩 실패 허용 횟수 (초과 시 스레드 종료)
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 30;

/// 프레임 공급자 (디코더 추상화)
pub trait FrameSource: Send + 'static {
    /// 다음 프레임을 image에 디코딩하고 frame count 반환
    /// Ok(None): 스트림 끝, Err: 이번 프레임 실패 (다음 호출로 계속 가능)
    /// image 크기가 맞지 않으면 구현체가 새로 할당해도 됨
    fn decode_next(&mut self, image: &mut FrameImage) -> Result<Option<i64>, String>;
}

/// 프리페처 설정
#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    /// 재활용 불가 상태에서 허용하는 최대 저장 프레임 수
    pub max_buffered_frames: usize,
    pub idle_interval: Duration,
    pub max_consecutive_errors: u32,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            max_buffered_frames: DEFAULT_MAX_BUFFERED_FRAMES,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}

/// 백그라운드 프리페처
pub struct FramePrefetcher {
    fifo: Arc<VideoFifo>,
    fill_thread: Option<JoinHandle<()>>,
    /// 스레드 취소 플래그
    cancelled: Arc<AtomicBool>,
    /// 스트림 끝 도달 (또는 연속 에러로 중단)
    finished: Arc<AtomicBool>,
    frames_produced: Arc<AtomicU64>,
}

impl FramePrefetcher {
    /// 프리페치 시작
    pub fn start<S: FrameSource>(
        fifo: Arc<VideoFifo>,
        source: S,
        config: PrefetchConfig,
    ) -> Result<Self, String> {
        fifo.settings().validate()?;
        if config.max_buffered_frames == 0 {
            return Err("max_buffered_frames must be at least 1".to_string());
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let frames_produced = Arc::new(AtomicU64::new(0));

        let worker = FillWorker {
            fifo: Arc::clone(&fifo),
            config,
            cancelled: Arc::clone(&cancelled),
            finished: Arc::clone(&finished),
            frames_produced: Arc::clone(&frames_produced),
        };

        let handle = thread::Builder::new()
            .name("video-fifo-prefetch".to_string())
            .spawn(move || worker.run(source))
            .map_err(|e| format!("Failed to spawn prefetch thread: {}", e))?;

        info!("FramePrefetcher: started");

        Ok(Self {
            fifo,
            fill_thread: Some(handle),
            cancelled,
            finished,
            frames_produced,
        })
    }

    /// 정지 (스레드 join). FIFO 내용은 유지
    pub fn stop(&mut self) {
        let Some(handle) = self.fill_thread.take() else {
            return;
        };

        self.cancelled.store(true, Ordering::SeqCst);
        if handle.join().is_err() {
            error!("FramePrefetcher: fill thread panicked");
        }

        debug!(
            "FramePrefetcher: stopped after {} frames (fifo size {})",
            self.frames_produced(),
            self.fifo.size()
        );
    }

    pub fn is_running(&self) -> bool {
        self.fill_thread.as_ref().map_or(false, |h| !h.is_finished())
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn frames_produced(&self) -> u64 {
        self.frames_produced.load(Ordering::SeqCst)
    }

    pub fn fifo(&self) -> &Arc<VideoFifo> {
        &self.fifo
    }
}

impl Drop for FramePrefetcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// fill 스레드 상태
struct FillWorker {
    fifo: Arc<VideoFifo>,
    config: PrefetchConfig,
    cancelled: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    frames_produced: Arc<AtomicU64>,
}

impl FillWorker {
    fn run<S: FrameSource>(self, mut source: S) {
        let mut consecutive_errors: u32 = 0;
        let mut error_count: u64 = 0;

        while !self.cancelled.load(Ordering::SeqCst) {
            let Some(mut image) = self.next_image() else {
                // 소비자가 아직 앞으로 가지 않음 → 대기
                thread::sleep(self.config.idle_interval);
                continue;
            };

            match source.decode_next(&mut image) {
                Ok(Some(frame_count)) => {
                    consecutive_errors = 0;
                    self.fifo.push(frame_count, image);
                    let produced = self.frames_produced.fetch_add(1, Ordering::SeqCst) + 1;

                    if produced <= 3 || produced % 300 == 0 {
                        debug!(
                            "FramePrefetcher: frame #{} at {}, fifo size {}, ahead {}",
                            produced,
                            frame_count,
                            self.fifo.size(),
                            self.fifo.num_available_frames()
                        );
                    }
                }
                Ok(None) => {
                    info!(
                        "FramePrefetcher: end of stream after {} frames ({} errors)",
                        self.frames_produced.load(Ordering::SeqCst),
                        error_count
                    );
                    self.finished.store(true, Ordering::SeqCst);
                    return;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    error_count += 1;
                    // 이미지는 버림. 다음 반복에서 재활용/할당
                    if error_count <= 10 {
                        warn!("FramePrefetcher: decode error #{}: {}", error_count, e);
                    }
                    if consecutive_errors >= self.config.max_consecutive_errors {
                        error!(
                            "FramePrefetcher: {} consecutive decode errors, giving up",
                            consecutive_errors
                        );
                        self.finished.store(true, Ordering::SeqCst);
                        return;
                    }
                }
            }
        }

        debug!("FramePrefetcher: fill loop cancelled");
    }

    /// 디코더에 줄 이미지: 재활용 → (여유 있으면) 새 할당 → 가득 찼으면 None
    fn next_image(&self) -> Option<FrameImage> {
        if let Some(image) = self.fifo.try_recycle_frame() {
            return Some(image);
        }

        if self.fifo.size() >= self.config.max_buffered_frames {
            return None;
        }

        Some(self.fifo.oldest_frame_for_recycling())
    }
}
