// 비디오 스트림 설정 - 프레임 크기, 타임베이스, 기본 프레임 길이
// VideoFifo가 placeholder 크기 결정과 시간↔frame count 변환에 사용

use super::image::PixelFormat;

/// 기본 프리뷰 해상도 (렌더러와 동일한 960x540)
pub const DEFAULT_WIDTH: u32 = 960;
pub const DEFAULT_HEIGHT: u32 = 540;

/// 기본 타임베이스: 30 tick/초 (30fps, 1 tick = 1 frame)
pub const DEFAULT_TIMEBASE: i64 = 30;

/// 프레임 크기
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// 스트림 설정 (스트림 사이 또는 초기 설정 시에만 변경, 재생 중 변경 X)
#[derive(Debug, Clone, PartialEq)]
pub struct VideoStreamSettings {
    pub frame_size: FrameSize,
    /// 재활용 placeholder의 픽셀 포맷
    pub pixel_format: PixelFormat,
    /// 초당 tick 수 (frame count = 초 * timebase)
    pub timebase: i64,
    /// 프레임 하나가 차지하는 tick 수 (display window 계산용)
    pub default_duration: i64,
}

impl Default for VideoStreamSettings {
    fn default() -> Self {
        Self {
            frame_size: FrameSize::new(DEFAULT_WIDTH, DEFAULT_HEIGHT),
            pixel_format: PixelFormat::Rgba,
            timebase: DEFAULT_TIMEBASE,
            default_duration: 1,
        }
    }
}

impl VideoStreamSettings {
    pub fn new(width: u32, height: u32, timebase: i64, default_duration: i64) -> Self {
        Self {
            frame_size: FrameSize::new(width, height),
            timebase,
            default_duration,
            ..Self::default()
        }
    }

    /// 설정 검증 (FFI/프리페처 진입점에서 호출)
    pub fn validate(&self) -> Result<(), String> {
        if self.frame_size.width == 0 || self.frame_size.height == 0 {
            return Err(format!(
                "Invalid frame size: {}x{}",
                self.frame_size.width, self.frame_size.height
            ));
        }
        if self.timebase <= 0 {
            return Err(format!("Invalid timebase: {}", self.timebase));
        }
        if self.default_duration < 0 {
            return Err(format!("Invalid default duration: {}", self.default_duration));
        }
        Ok(())
    }

    /// 초 → frame count (소수점 유지, lower bound 검색용)
    pub fn time_to_frame_count(&self, time: f64) -> f64 {
        time * self.timebase as f64
    }

    /// frame count → 초
    pub fn frame_count_to_time(&self, frame_count: i64) -> f64 {
        frame_count as f64 / self.timebase as f64
    }

    /// 프레임 표시 구간의 끝 (초)
    pub fn frame_end_time(&self, frame_count: i64) -> f64 {
        frame_count.saturating_add(self.default_duration) as f64 / self.timebase as f64
    }

    /// 초당 프레임 수 (default_duration이 0이면 timebase 그대로)
    pub fn frame_rate(&self) -> f64 {
        if self.default_duration > 0 {
            self.timebase as f64 / self.default_duration as f64
        } else {
            self.timebase as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = VideoStreamSettings::default();
        assert_eq!(settings.frame_size, FrameSize::new(960, 540));
        assert_eq!(settings.pixel_format, PixelFormat::Rgba);
        assert_eq!(settings.timebase, 30);
        assert_eq!(settings.default_duration, 1);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(VideoStreamSettings::new(0, 540, 30, 1).validate().is_err());
        assert!(VideoStreamSettings::new(960, 0, 30, 1).validate().is_err());
        assert!(VideoStreamSettings::new(960, 540, 0, 1).validate().is_err());
        assert!(VideoStreamSettings::new(960, 540, 30, -1).validate().is_err());
        assert!(VideoStreamSettings::new(960, 540, 30, 0).validate().is_ok());
    }

    #[test]
    fn test_time_conversion() {
        // 90kHz 타임베이스, 25fps → 3600 tick/frame
        let settings = VideoStreamSettings::new(1920, 1080, 90000, 3600);

        assert_eq!(settings.time_to_frame_count(1.0), 90000.0);
        assert_eq!(settings.frame_count_to_time(45000), 0.5);
        assert_eq!(settings.frame_end_time(0), 0.04);
        assert_eq!(settings.frame_rate(), 25.0);
    }

    #[test]
    fn test_frame_end_time_saturates() {
        let settings = VideoStreamSettings::new(4, 4, 1, 10);
        assert_eq!(settings.frame_end_time(i64::MAX), i64::MAX as f64);
        assert_eq!(settings.frame_end_time(i64::MAX - 5), i64::MAX as f64);
    }
}
