// 프레임 이미지 - 디코더가 채우고 VideoFifo가 보관/재활용하는 픽셀 버퍼
// 픽셀 데이터는 Arc로 공유 (clone은 핸들 복사, lock 안에서 픽셀 복사 없음)

use std::sync::Arc;

use super::settings::VideoStreamSettings;

/// 픽셀 포맷
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba,
    Bgra,
    Argb,
    Rgb,
    Yuv420p,
}

impl PixelFormat {
    /// 한 프레임의 바이트 수 (YUV420P는 chroma 1/4 평면 2개)
    pub fn buffer_size(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Rgba | PixelFormat::Bgra | PixelFormat::Argb => pixels * 4,
            PixelFormat::Rgb => pixels * 3,
            PixelFormat::Yuv420p => {
                let chroma = ((width as usize + 1) / 2) * ((height as usize + 1) / 2);
                pixels + chroma * 2
            }
        }
    }

    /// FFI 정수 태그 → 포맷
    pub fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(PixelFormat::Rgba),
            1 => Some(PixelFormat::Bgra),
            2 => Some(PixelFormat::Argb),
            3 => Some(PixelFormat::Rgb),
            4 => Some(PixelFormat::Yuv420p),
            _ => None,
        }
    }
}

/// 디코딩된 프레임의 픽셀 버퍼
#[derive(Debug, Clone)]
pub struct FrameImage {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Arc<Vec<u8>>,
}

impl FrameImage {
    /// 빈 이미지 할당
    /// clear=true면 0으로 채운 상태가 보장됨. false면 호출자가 내용을 기대하지 않음
    /// (디코더가 곧 덮어쓸 버퍼용)
    pub fn new(format: PixelFormat, width: u32, height: u32, _clear: bool) -> Self {
        // 미초기화 메모리는 노출하지 않음 → 항상 0 초기화
        // vec![0; n]은 calloc 경로라 clear=false여도 추가 비용 없음
        let size = format.buffer_size(width, height);

        Self {
            width,
            height,
            format,
            pixels: Arc::new(vec![0u8; size]),
        }
    }

    /// 설정 기준 빈 이미지 (재활용 placeholder)
    pub fn blank_for(settings: &VideoStreamSettings) -> Self {
        Self::new(
            settings.pixel_format,
            settings.frame_size.width,
            settings.frame_size.height,
            false,
        )
    }

    /// 기존 픽셀 데이터로 이미지 생성 (크기 불일치 시 Err)
    pub fn from_data(format: PixelFormat, width: u32, height: u32, data: Vec<u8>) -> Result<Self, String> {
        let expected = format.buffer_size(width, height);
        if data.len() != expected {
            return Err(format!(
                "Pixel data size mismatch: expected {} bytes for {}x{} {:?}, got {}",
                expected, width, height, format, data.len()
            ));
        }

        Ok(Self {
            width,
            height,
            format,
            pixels: Arc::new(data),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.pixels
    }

    /// 쓰기용 픽셀 슬라이스
    /// 소비자가 아직 같은 픽셀을 들고 있으면 여기서 복사 (copy-on-write)
    pub fn data_mut(&mut self) -> &mut [u8] {
        Arc::make_mut(&mut self.pixels).as_mut_slice()
    }

    /// 다른 핸들과 픽셀을 공유하지 않는지 (재활용 시 복사 없이 쓸 수 있는지)
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.pixels) == 1
    }

    /// 같은 픽셀 저장소를 가리키는지
    pub fn shares_pixels_with(&self, other: &FrameImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    /// 설정과 크기/포맷이 같은지 (다르면 디코더가 재할당해야 함)
    pub fn matches(&self, settings: &VideoStreamSettings) -> bool {
        self.width == settings.frame_size.width
            && self.height == settings.frame_size.height
            && self.format == settings.pixel_format
    }
}
