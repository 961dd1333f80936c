use jep106::JEP106Code;
use serde::{ser::SerializeStruct, Serializer};

pub fn serialize_option<S>(code: &Option<JEP106Code>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match code {
        Some(code) => {
            let human_readable = serializer.is_human_readable();
            let mut state = serializer.serialize_struct("JEP106Code", 2)?;
            if human_readable {
                state.serialize_field("id", &format!("{:#x}", code.id))?;
                state.serialize_field("cc", &format!("{:#x}", code.cc))?;
            } else {
                state.serialize_field("id", &code.id)?;
                state.serialize_field("cc", &code.cc)?;
            }
            state.end()
        }
        None => serializer.serialize_none(),
    }
}
