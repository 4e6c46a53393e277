mod stage1;
mod utf8;

pub(crate) use stage1::SimdInput;
