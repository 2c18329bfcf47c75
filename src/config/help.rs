use serde::{Deserialize, Serialize};

// Implements help messages for keys
// with value as description of the keys.
#[derive(Serialize, Deserialize, Default, Clone, Debug)]
pub struct HelpKV {
    pub key: String,
    #[serde(rename = "type")]
    pub typ: String,
    pub description: String,
    pub optional: bool,
}

#[derive(Default, Debug)]
pub struct HelpKVS(pub Vec<HelpKV>);

impl HelpKVS {
    pub fn lookup(&self, key: &str) -> Option<&HelpKV> {
        self.0.iter().find(|kv| kv.key == key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HelpKV> {
        self.0.iter()
    }
}

pub const DEFAULT_COMMENT: &str = "optionally add a comment to this setting";
