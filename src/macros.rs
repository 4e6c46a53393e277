/// Reinterpreting casts for moving bit patterns between the integer types
/// the intrinsics want and the unsigned masks the scanner works with.
macro_rules! static_cast_i32 {
    ($v:expr) => {
        $v as i32
    };
}

macro_rules! static_cast_u32 {
    ($v:expr) => {
        $v as u32
    };
}

macro_rules! static_cast_i64 {
    ($v:expr) => {
        $v as i64
    };
}

macro_rules! static_cast_u64 {
    ($v:expr) => {
        $v as u64
    };
}

/// `likely!`/`unlikely!` are plain pass-throughs; they mark the intent on
/// branches the original annotated and keep call sites grep-compatible.
macro_rules! likely {
    ($e:expr) => {
        $e
    };
}

macro_rules! unlikely {
    ($e:expr) => {
        $e
    };
}
