use serde::{Serialize, Serializer};

pub(crate) fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: std::fmt::LowerHex + Serialize,
{
    if serializer.is_human_readable() {
        serializer.serialize_str(&format!("{value:#x}"))
    } else {
        value.serialize(serializer)
    }
}
