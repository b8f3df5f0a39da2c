//! 디코더 ↔ 재생 소비자 사이의 프레임 FIFO
//!
//! - frame count(타임베이스 tick) 기준 정렬 저장 (BTreeMap)
//! - 시간 기반 조회: lower bound (정확히 일치하거나 바로 다음 프레임)
//! - 재생 방향을 고려한 재활용: 소비자가 이미 지나간 프레임의 픽셀 버퍼를 디코더에 반환
//! - 모든 연산은 단일 Mutex 하나로 보호 (맵 + last_viewed + reverse + settings)

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, trace};

use super::image::FrameImage;
use super::settings::VideoStreamSettings;

/// frame count가 붙은 프레임
#[derive(Debug, Clone)]
pub struct TimedFrame {
    pub frame_count: i64,
    pub image: FrameImage,
}

/// Mutex 안쪽 상태
struct FifoState {
    frames: BTreeMap<i64, FrameImage>,
    /// 마지막으로 시간 조회에 매칭된 frame count (None = 아직 없음)
    last_viewed_frame: Option<i64>,
    reverse: bool,
    settings: VideoStreamSettings,
}

impl FifoState {
    /// time * timebase 이상인 첫 프레임
    fn lower_bound(&self, time: f64) -> Option<(i64, &FrameImage)> {
        let target = self.settings.time_to_frame_count(time);
        let key = lower_bound_key(target)?;
        self.frames.range(key..).next().map(|(&k, image)| (k, image))
    }

    /// 재생 방향 기준으로만 전진 (역방향 이동은 clear()로만 초기화)
    fn advance_viewed(&mut self, frame_count: i64) {
        let next = match self.last_viewed_frame {
            None => frame_count,
            Some(last) if self.reverse => last.min(frame_count),
            Some(last) => last.max(frame_count),
        };
        self.last_viewed_frame = Some(next);
    }

    /// 재활용 가능한 프레임 제거 후 반환
    /// forward: 가장 낮은 key < last_viewed, reverse: 가장 높은 key > last_viewed
    fn take_recyclable(&mut self) -> Option<(i64, FrameImage)> {
        let last_viewed = self.last_viewed_frame?;

        if self.reverse {
            let (&key, _) = self.frames.last_key_value()?;
            if key > last_viewed {
                return self.frames.pop_last();
            }
        } else {
            let (&key, _) = self.frames.first_key_value()?;
            if key < last_viewed {
                return self.frames.pop_first();
            }
        }

        None
    }
}

/// 정수 frame count로 간주하는 부동소수 오차 범위
const FRAME_COUNT_EPSILON: f64 = 1e-9;

/// time * timebase 오차 보정 (125.00000000000001 → 125.0)
fn snap_frame_count(target: f64) -> f64 {
    let rounded = target.round();
    if (target - rounded).abs() < FRAME_COUNT_EPSILON {
        rounded
    } else {
        target
    }
}

/// 실수 frame count → lower bound 정수 key (NaN/범위 초과면 None)
fn lower_bound_key(target: f64) -> Option<i64> {
    if target.is_nan() || target >= i64::MAX as f64 {
        return None;
    }
    Some(snap_frame_count(target).ceil() as i64)
}

/// 프레임 FIFO (Arc로 감싸 디코더/소비자 스레드가 공유)
pub struct VideoFifo {
    state: Mutex<FifoState>,
}

impl Default for VideoFifo {
    fn default() -> Self {
        Self::new(VideoStreamSettings::default())
    }
}

impl VideoFifo {
    /// 스트림당 한 번 생성
    pub fn new(settings: VideoStreamSettings) -> Self {
        Self {
            state: Mutex::new(FifoState {
                frames: BTreeMap::new(),
                last_viewed_frame: None,
                reverse: false,
                settings,
            }),
        }
    }

    /// 모든 임계 구역은 맵을 일관된 상태로 남기므로 poison은 복구
    fn lock(&self) -> MutexGuard<'_, FifoState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 프레임 추가 (같은 frame count가 있으면 덮어씀)
    pub fn push(&self, frame_count: i64, image: FrameImage) {
        let replaced = self.lock().frames.insert(frame_count, image);
        if replaced.is_some() {
            trace!("VideoFifo: frame {} overwritten", frame_count);
        }
    }

    /// 가장 낮은 frame count의 프레임 제거 후 반환 (flush용)
    pub fn pop(&self) -> Option<TimedFrame> {
        self.lock()
            .frames
            .pop_first()
            .map(|(frame_count, image)| TimedFrame { frame_count, image })
    }

    /// 재생 위치 조회 + 위치 기록 (순수 조회 아님!)
    /// time(초) * timebase 이상인 첫 프레임을 반환하고 그 key를 last_viewed로 기록
    /// 기록 없이 보기만 하려면 peek_video_frame() 사용
    pub fn get_video_frame(&self, time: f64) -> Option<TimedFrame> {
        let mut state = self.lock();

        let (frame_count, image) = state.lower_bound(time)?;
        let frame = TimedFrame {
            frame_count,
            image: image.clone(),
        };
        state.advance_viewed(frame_count);

        Some(frame)
    }

    /// 순수 조회 (last_viewed 변경 없음)
    pub fn peek_video_frame(&self, time: f64) -> Option<TimedFrame> {
        let state = self.lock();
        state.lower_bound(time).map(|(frame_count, image)| TimedFrame {
            frame_count,
            image: image.clone(),
        })
    }

    /// 재생 위치 명시적 전진 (peek_video_frame과 짝)
    pub fn mark_viewed(&self, frame_count: i64) {
        self.lock().advance_viewed(frame_count);
    }

    /// time 시점을 표시할 프레임이 있는지
    /// time 이하에서 시작하는 마지막 프레임의 표시 구간 [K, K + default_duration] / timebase 안에 있어야 true
    pub fn is_frame_available(&self, time: f64) -> bool {
        let state = self.lock();

        let target = state.settings.time_to_frame_count(time);
        if target.is_nan() || target < i64::MIN as f64 {
            return false;
        }
        let floor_key = snap_frame_count(target).floor() as i64;

        match state.frames.range(..=floor_key).next_back() {
            Some((&key, _)) => time <= state.settings.frame_end_time(key),
            None => false,
        }
    }

    /// lower bound frame count (위치 기록 없음)
    pub fn frame_count_for_time(&self, time: f64) -> Option<i64> {
        self.lock().lower_bound(time).map(|(frame_count, _)| frame_count)
    }

    pub fn size(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().frames.is_empty()
    }

    /// 소비자가 아직 지나가지 않은 프레임 수 (key >= last_viewed, 선행 버퍼 깊이)
    pub fn num_available_frames(&self) -> usize {
        let state = self.lock();
        match state.last_viewed_frame {
            None => state.frames.len(),
            Some(last_viewed) => state.frames.range(last_viewed..).count(),
        }
    }

    pub fn lowest_time_code(&self) -> Option<i64> {
        self.lock().frames.first_key_value().map(|(&k, _)| k)
    }

    pub fn highest_time_code(&self) -> Option<i64> {
        self.lock().frames.last_key_value().map(|(&k, _)| k)
    }

    pub fn last_viewed_frame(&self) -> Option<i64> {
        self.lock().last_viewed_frame
    }

    /// 재활용 가능한 프레임만 꺼냄 (없으면 None, 할당 없음)
    /// 프리페처의 back-pressure 판단용
    pub fn try_recycle_frame(&self) -> Option<FrameImage> {
        let (frame_count, image) = self.lock().take_recyclable()?;
        trace!("VideoFifo: recycled frame {}", frame_count);
        Some(image)
    }

    /// 디코더가 덮어쓸 이미지 반환
    /// 재활용할 프레임이 없으면 설정 크기의 빈 이미지를 새로 할당 (항상 유효한 이미지)
    pub fn oldest_frame_for_recycling(&self) -> FrameImage {
        let settings = {
            let mut state = self.lock();
            if let Some((frame_count, image)) = state.take_recyclable() {
                trace!("VideoFifo: recycled frame {}", frame_count);
                return image;
            }
            state.settings.clone()
        };

        // 할당은 lock 밖에서
        trace!(
            "VideoFifo: nothing to recycle, allocating {}x{} {:?}",
            settings.frame_size.width,
            settings.frame_size.height,
            settings.pixel_format
        );
        FrameImage::blank_for(&settings)
    }

    /// 전체 비우기 + 재생 위치 초기화 (seek/stop 시)
    pub fn clear(&self) {
        let frames = {
            let mut state = self.lock();
            state.last_viewed_frame = None;
            std::mem::take(&mut state.frames)
        };
        debug!("VideoFifo: cleared {} frames", frames.len());
    }

    /// frame_count 미만 프레임 제거
    /// 단, cutoff 바로 앞 프레임 하나는 남김 (frame_count가 첫 key 이하면 아무것도 안 함)
    pub fn clear_frames_older_than(&self, frame_count: i64) {
        let removed = {
            let mut state = self.lock();
            let keep = match state.frames.range(..frame_count).next_back() {
                Some((&key, _)) => key,
                None => return,
            };
            let retained = state.frames.split_off(&keep);
            std::mem::replace(&mut state.frames, retained)
        };

        if !removed.is_empty() {
            trace!("VideoFifo: dropped {} frames older than {}", removed.len(), frame_count);
        }
    }

    /// 재생 방향 설정 (transport에서만 호출)
    pub fn set_reverse(&self, reverse: bool) {
        let mut state = self.lock();
        if state.reverse != reverse {
            debug!("VideoFifo: direction -> {}", if reverse { "reverse" } else { "forward" });
        }
        state.reverse = reverse;
    }

    pub fn is_reverse(&self) -> bool {
        self.lock().reverse
    }

    pub fn settings(&self) -> VideoStreamSettings {
        self.lock().settings.clone()
    }

    /// 설정 교체 (스트림 사이에서만)
    pub fn set_settings(&self, settings: VideoStreamSettings) {
        self.lock().settings = settings;
    }

    pub fn update_settings<F: FnOnce(&mut VideoStreamSettings)>(&self, f: F) {
        f(&mut self.lock().settings);
    }
}
