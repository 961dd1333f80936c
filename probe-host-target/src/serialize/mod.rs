mod hex_jep106;
mod hex_range;
mod hex_u_int;

pub(crate) use hex_jep106::serialize_option as hex_jep106_option;
pub(crate) use hex_range::serialize as hex_range;
pub(crate) use hex_u_int::serialize as hex_u_int;
