// FFI 공통 타입 - 호스트(C#/C)에 반환하는 에러 코드

/// FFI 함수 반환 코드 (i32로 변환해서 반환)
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    NullPointer = -1,
    InvalidParam = -2,
}

