use serde::{Deserialize, Deserializer};

/// Deserializes `null` as the default value, peers encode empty lists and
/// maps as `null`.
pub fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
