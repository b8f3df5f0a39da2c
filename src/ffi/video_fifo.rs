// VideoFifo FFI - 호스트 디코더/플레이어 연동
// 핸들은 Arc<VideoFifo>의 raw pointer (디코더/렌더 스레드에서 동시 호출 가능)
// 호스트 쪽 sentinel은 원래 규약 유지:
// - frame count 조회 실패: -1
// - 빈 FIFO의 최저/최고 time code: 0

use std::ffi::c_void;
use std::sync::Arc;

use libc::size_t;

use crate::ffi::types::ErrorCode;
use crate::video::{FrameImage, PixelFormat, TimedFrame, VideoFifo, VideoStreamSettings};

/// 프레임 조회 실패 시 frame count
const FRAME_COUNT_NOT_FOUND: i64 = -1;

/// 빈 FIFO의 time code
const EMPTY_TIME_CODE: i64 = 0;

/// 핸들 → VideoFifo 참조 (소유권 변경 없음)
unsafe fn fifo_ref<'a>(handle: *mut c_void) -> &'a VideoFifo {
    &*(handle as *const VideoFifo)
}

/// 프레임을 호스트 소유 버퍼로 복사해서 out 파라미터에 기록
/// 프레임이 없으면 frame count -1, data null
unsafe fn write_frame_out(
    frame: Option<TimedFrame>,
    out_frame_count: *mut i64,
    out_data: *mut *mut u8,
    out_size: *mut size_t,
) {
    match frame {
        Some(frame) => {
            let data_box: Box<[u8]> = frame.image.data().into();
            *out_frame_count = frame.frame_count;
            *out_size = data_box.len();
            *out_data = Box::into_raw(data_box) as *mut u8;
        }
        None => {
            *out_frame_count = FRAME_COUNT_NOT_FOUND;
            *out_size = 0;
            *out_data = std::ptr::null_mut();
        }
    }
}

/// VideoFifo 생성
/// pixel_format: 0=RGBA, 1=BGRA, 2=ARGB, 3=RGB, 4=YUV420P
#[no_mangle]
pub extern "C" fn video_fifo_create(
    width: u32,
    height: u32,
    pixel_format: i32,
    timebase: i64,
    default_duration: i64,
    out_handle: *mut *mut c_void,
) -> i32 {
    if out_handle.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    let Some(pixel_format) = PixelFormat::from_tag(pixel_format) else {
        return ErrorCode::InvalidParam as i32;
    };

    let settings = VideoStreamSettings {
        pixel_format,
        ..VideoStreamSettings::new(width, height, timebase, default_duration)
    };
    if let Err(e) = settings.validate() {
        log::warn!("video_fifo_create: {}", e);
        return ErrorCode::InvalidParam as i32;
    }

    let fifo = Arc::new(VideoFifo::new(settings));

    unsafe {
        *out_handle = Arc::into_raw(fifo) as *mut c_void;
    }

    ErrorCode::Success as i32
}

/// VideoFifo 파괴 (남은 프레임 해제)
#[no_mangle]
pub extern "C" fn video_fifo_destroy(handle: *mut c_void) -> i32 {
    if handle.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let _ = Arc::from_raw(handle as *const VideoFifo);
    }

    ErrorCode::Success as i32
}

/// 디코딩된 픽셀 데이터 push
/// 재활용 이미지에 복사하므로 호스트 버퍼는 호출 직후 재사용 가능
/// size는 설정의 프레임 크기와 정확히 같아야 함
#[no_mangle]
pub extern "C" fn video_fifo_push(
    handle: *mut c_void,
    frame_count: i64,
    data: *const u8,
    size: size_t,
) -> i32 {
    if handle.is_null() || data.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let fifo = fifo_ref(handle);
        let settings = fifo.settings();

        let expected = settings
            .pixel_format
            .buffer_size(settings.frame_size.width, settings.frame_size.height);
        if size != expected {
            log::warn!(
                "video_fifo_push: frame {} has {} bytes, expected {}",
                frame_count, size, expected
            );
            return ErrorCode::InvalidParam as i32;
        }

        let mut image = fifo.oldest_frame_for_recycling();
        if !image.matches(&settings) {
            // 설정 변경 전에 저장된 프레임 → 재할당
            image = FrameImage::blank_for(&settings);
        }

        let source = std::slice::from_raw_parts(data, size);
        image.data_mut().copy_from_slice(source);
        fifo.push(frame_count, image);
    }

    ErrorCode::Success as i32
}

/// 가장 낮은 frame count 프레임 꺼내기 (flush용)
/// 반환 데이터는 video_fifo_free_frame_data로 해제
#[no_mangle]
pub extern "C" fn video_fifo_pop(
    handle: *mut c_void,
    out_frame_count: *mut i64,
    out_data: *mut *mut u8,
    out_size: *mut size_t,
) -> i32 {
    if handle.is_null() || out_frame_count.is_null() || out_data.is_null() || out_size.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let frame = fifo_ref(handle).pop();
        write_frame_out(frame, out_frame_count, out_data, out_size);
    }

    ErrorCode::Success as i32
}

/// 재생 위치(초)의 프레임 조회 + 재생 위치 기록
/// 프레임이 없으면 out_frame_count=-1, out_data=null (에러 아님)
#[no_mangle]
pub extern "C" fn video_fifo_get_video_frame(
    handle: *mut c_void,
    time: f64,
    out_frame_count: *mut i64,
    out_data: *mut *mut u8,
    out_size: *mut size_t,
) -> i32 {
    if handle.is_null() || out_frame_count.is_null() || out_data.is_null() || out_size.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        // 복사는 lock 밖에서 (TimedFrame은 픽셀 핸들만 보유)
        let frame = fifo_ref(handle).get_video_frame(time);
        write_frame_out(frame, out_frame_count, out_data, out_size);
    }

    ErrorCode::Success as i32
}

/// 프레임 데이터 해제 (pop/get_video_frame 반환값)
#[no_mangle]
pub extern "C" fn video_fifo_free_frame_data(data: *mut u8, size: size_t) -> i32 {
    if data.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        let slice = std::slice::from_raw_parts_mut(data, size);
        let _ = Box::from_raw(slice as *mut [u8]);
    }

    ErrorCode::Success as i32
}

/// time 시점을 표시할 프레임 존재 여부 (1/0)
#[no_mangle]
pub extern "C" fn video_fifo_is_frame_available(
    handle: *mut c_void,
    time: f64,
    out_available: *mut i32,
) -> i32 {
    if handle.is_null() || out_available.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        *out_available = i32::from(fifo_ref(handle).is_frame_available(time));
    }

    ErrorCode::Success as i32
}

/// time 이후 첫 프레임의 frame count (없으면 -1)
#[no_mangle]
pub extern "C" fn video_fifo_get_frame_count_for_time(
    handle: *mut c_void,
    time: f64,
    out_frame_count: *mut i64,
) -> i32 {
    if handle.is_null() || out_frame_count.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        *out_frame_count = fifo_ref(handle)
            .frame_count_for_time(time)
            .unwrap_or(FRAME_COUNT_NOT_FOUND);
    }

    ErrorCode::Success as i32
}

#[no_mangle]
pub extern "C" fn video_fifo_size(handle: *mut c_void, out_size: *mut size_t) -> i32 {
    if handle.is_null() || out_size.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        *out_size = fifo_ref(handle).size();
    }

    ErrorCode::Success as i32
}

/// 아직 재생되지 않은 프레임 수 (transport 버퍼링 판단용)
#[no_mangle]
pub extern "C" fn video_fifo_get_num_available_frames(
    handle: *mut c_void,
    out_count: *mut size_t,
) -> i32 {
    if handle.is_null() || out_count.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        *out_count = fifo_ref(handle).num_available_frames();
    }

    ErrorCode::Success as i32
}

/// 최저 frame count (비었으면 0)
#[no_mangle]
pub extern "C" fn video_fifo_get_lowest_time_code(
    handle: *mut c_void,
    out_time_code: *mut i64,
) -> i32 {
    if handle.is_null() || out_time_code.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        *out_time_code = fifo_ref(handle).lowest_time_code().unwrap_or(EMPTY_TIME_CODE);
    }

    ErrorCode::Success as i32
}

/// 최고 frame count (비었으면 0)
#[no_mangle]
pub extern "C" fn video_fifo_get_highest_time_code(
    handle: *mut c_void,
    out_time_code: *mut i64,
) -> i32 {
    if handle.is_null() || out_time_code.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        *out_time_code = fifo_ref(handle).highest_time_code().unwrap_or(EMPTY_TIME_CODE);
    }

    ErrorCode::Success as i32
}

/// 재생 방향 설정 (reverse=1: 역재생)
#[no_mangle]
pub extern "C" fn video_fifo_set_reverse(handle: *mut c_void, reverse: i32) -> i32 {
    if handle.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        fifo_ref(handle).set_reverse(reverse != 0);
    }

    ErrorCode::Success as i32
}

/// 전체 비우기 (seek/stop)
#[no_mangle]
pub extern "C" fn video_fifo_clear(handle: *mut c_void) -> i32 {
    if handle.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        fifo_ref(handle).clear();
    }

    ErrorCode::Success as i32
}

/// frame_count 미만 프레임 정리 (바로 앞 프레임 하나는 유지)
#[no_mangle]
pub extern "C" fn video_fifo_clear_frames_older_than(handle: *mut c_void, frame_count: i64) -> i32 {
    if handle.is_null() {
        return ErrorCode::NullPointer as i32;
    }

    unsafe {
        fifo_ref(handle).clear_frames_older_than(frame_count);
    }

    ErrorCode::Success as i32
}

/// 로거 초기화 (RUST_LOG 환경변수, 여러 번 호출해도 안전)
#[no_mangle]
pub extern "C" fn video_fifo_init_logging() -> i32 {
    crate::init_logging();
    ErrorCode::Success as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2x1 RGBA, timebase 10, duration 1
    fn create_handle() -> *mut c_void {
        let mut handle: *mut c_void = std::ptr::null_mut();
        let result = video_fifo_create(2, 1, 0, 10, 1, &mut handle);
        assert_eq!(result, ErrorCode::Success as i32);
        assert!(!handle.is_null());
        handle
    }

    fn push_tagged(handle: *mut c_void, frame_count: i64, tag: u8) {
        let pixels = [tag; 8];
        let result = video_fifo_push(handle, frame_count, pixels.as_ptr(), pixels.len());
        assert_eq!(result, ErrorCode::Success as i32);
    }

    #[test]
    fn test_create_rejects_invalid_params() {
        let mut handle: *mut c_void = std::ptr::null_mut();
        assert_eq!(video_fifo_create(0, 1, 0, 10, 1, &mut handle), ErrorCode::InvalidParam as i32);
        assert_eq!(video_fifo_create(2, 1, 0, 0, 1, &mut handle), ErrorCode::InvalidParam as i32);
        assert_eq!(video_fifo_create(2, 1, 42, 10, 1, &mut handle), ErrorCode::InvalidParam as i32);
        assert_eq!(
            video_fifo_create(2, 1, 0, 10, 1, std::ptr::null_mut()),
            ErrorCode::NullPointer as i32
        );
        assert!(handle.is_null());
    }

    #[test]
    fn test_null_handle() {
        let mut value: i64 = 0;
        assert_eq!(video_fifo_destroy(std::ptr::null_mut()), ErrorCode::NullPointer as i32);
        assert_eq!(video_fifo_clear(std::ptr::null_mut()), ErrorCode::NullPointer as i32);
        assert_eq!(
            video_fifo_get_frame_count_for_time(std::ptr::null_mut(), 0.0, &mut value),
            ErrorCode::NullPointer as i32
        );
        assert_eq!(video_fifo_free_frame_data(std::ptr::null_mut(), 0), ErrorCode::NullPointer as i32);
    }

    #[test]
    fn test_push_and_get_video_frame() {
        let handle = create_handle();
        push_tagged(handle, 10, 0x11);
        push_tagged(handle, 20, 0x22);

        let mut frame_count: i64 = 0;
        let mut data: *mut u8 = std::ptr::null_mut();
        let mut size: size_t = 0;

        let result = video_fifo_get_video_frame(handle, 1.5, &mut frame_count, &mut data, &mut size);
        assert_eq!(result, ErrorCode::Success as i32);
        assert_eq!(frame_count, 20);
        assert_eq!(size, 8);
        let pixels = unsafe { std::slice::from_raw_parts(data, size) };
        assert!(pixels.iter().all(|&b| b == 0x22));
        assert_eq!(video_fifo_free_frame_data(data, size), ErrorCode::Success as i32);

        // 재생 위치 이후 프레임 → 1
        let mut available: size_t = 0;
        video_fifo_get_num_available_frames(handle, &mut available);
        assert_eq!(available, 1);

        assert_eq!(video_fifo_destroy(handle), ErrorCode::Success as i32);
    }

    #[test]
    fn test_push_rejects_wrong_size() {
        let handle = create_handle();
        let pixels = [0u8; 7];
        assert_eq!(
            video_fifo_push(handle, 0, pixels.as_ptr(), pixels.len()),
            ErrorCode::InvalidParam as i32
        );

        let mut size: size_t = 99;
        video_fifo_size(handle, &mut size);
        assert_eq!(size, 0);

        video_fifo_destroy(handle);
    }

    #[test]
    fn test_not_found_sentinels() {
        let handle = create_handle();

        // 빈 FIFO: time code는 0, frame count는 -1
        let mut lowest: i64 = 99;
        let mut highest: i64 = 99;
        let mut frame_count: i64 = 99;
        video_fifo_get_lowest_time_code(handle, &mut lowest);
        video_fifo_get_highest_time_code(handle, &mut highest);
        video_fifo_get_frame_count_for_time(handle, 0.0, &mut frame_count);
        assert_eq!(lowest, 0);
        assert_eq!(highest, 0);
        assert_eq!(frame_count, -1);

        let mut data: *mut u8 = std::ptr::null_mut();
        let mut size: size_t = 99;
        video_fifo_get_video_frame(handle, 0.0, &mut frame_count, &mut data, &mut size);
        assert_eq!(frame_count, -1);
        assert!(data.is_null());
        assert_eq!(size, 0);

        video_fifo_pop(handle, &mut frame_count, &mut data, &mut size);
        assert_eq!(frame_count, -1);
        assert!(data.is_null());

        video_fifo_destroy(handle);
    }

    #[test]
    fn test_time_codes_and_clear() {
        let handle = create_handle();
        push_tagged(handle, 10, 1);
        push_tagged(handle, 20, 2);
        push_tagged(handle, 30, 3);
        push_tagged(handle, 40, 4);

        let mut lowest: i64 = 0;
        let mut highest: i64 = 0;
        video_fifo_get_lowest_time_code(handle, &mut lowest);
        video_fifo_get_highest_time_code(handle, &mut highest);
        assert_eq!((lowest, highest), (10, 40));

        video_fifo_clear_frames_older_than(handle, 30);
        video_fifo_get_lowest_time_code(handle, &mut lowest);
        assert_eq!(lowest, 20);

        let mut available: i32 = 0;
        video_fifo_is_frame_available(handle, 3.05, &mut available);
        assert_eq!(available, 1);
        video_fifo_is_frame_available(handle, 4.5, &mut available);
        assert_eq!(available, 0);

        video_fifo_clear(handle);
        let mut size: size_t = 99;
        video_fifo_size(handle, &mut size);
        video_fifo_get_lowest_time_code(handle, &mut lowest);
        video_fifo_get_highest_time_code(handle, &mut highest);
        assert_eq!((size, lowest, highest), (0, 0, 0));

        video_fifo_destroy(handle);
    }

    #[test]
    fn test_push_reuses_recycled_frame() {
        let handle = create_handle();
        push_tagged(handle, 10, 1);
        push_tagged(handle, 20, 2);

        let mut frame_count: i64 = 0;
        let mut data: *mut u8 = std::ptr::null_mut();
        let mut size: size_t = 0;
        video_fifo_get_video_frame(handle, 2.0, &mut frame_count, &mut data, &mut size);
        video_fifo_free_frame_data(data, size);

        // 10은 재활용되어 30으로 교체 → 크기 유지
        push_tagged(handle, 30, 3);
        let mut count: size_t = 0;
        video_fifo_size(handle, &mut count);
        assert_eq!(count, 2);

        // 역재생: 30 > 20 재활용
        video_fifo_set_reverse(handle, 1);
        push_tagged(handle, 5, 9);
        let mut highest: i64 = 0;
        video_fifo_get_highest_time_code(handle, &mut highest);
        assert_eq!(highest, 20);

        video_fifo_pop(handle, &mut frame_count, &mut data, &mut size);
        assert_eq!(frame_count, 5);
        let pixels = unsafe { std::slice::from_raw_parts(data, size) };
        assert!(pixels.iter().all(|&b| b == 9));
        video_fifo_free_frame_data(data, size);

        video_fifo_destroy(handle);
    }
}
