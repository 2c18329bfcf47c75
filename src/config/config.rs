use anyhow::bail;
use serde::{Deserialize, Serialize};

pub const COMMON_KEY: &str = "comment";

// Top level config constants.
pub const HEAL_ADMIN_SUB_SYS: &str = "heal_admin";

// Constant separators
pub const KV_SEPARATOR: &str = "=";
pub const KV_SPACE_SEPARATOR: &str = " ";
pub const KV_DOUBLE_QUOTE: &str = "\"";
pub const KV_SINGLE_QUOTE: &str = "'";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct KV {
    pub key: String,
    pub value: String,
}

#[derive(Default, Clone, Debug)]
pub struct KVS(pub Vec<KV>);

impl KVS {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KV> {
        self.0.iter()
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys = Vec::with_capacity(self.0.len() + 1);
        let mut found_comment = false;
        for kv in &self.0 {
            if kv.key == COMMON_KEY {
                found_comment = true;
            }
            keys.push(kv.key.as_str());
        }
        // Comment Key not found, add it explicitly.
        if !found_comment {
            keys.push(COMMON_KEY);
        }
        keys
    }

    // Sets a key value pair.
    pub fn set(&mut self, key: String, value: String) {
        match self.0.iter_mut().find(|kv| kv.key == key) {
            Some(kv) => {
                kv.value = value;
            }
            None => self.0.push(KV { key, value }),
        }
    }

    pub fn get(&self, key: &str) -> &str {
        self.lookup(key).unwrap_or("")
    }

    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|&kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }

    /// Parses `key=value key2="some value"` into a KVS, keeping only the
    /// keys in `keys`.
    pub fn parse(input: &str, keys: &[&str]) -> anyhow::Result<KVS> {
        let mut kvs = KVS::default();
        for f in kv_fields(input, keys) {
            let kv: Vec<&str> = f.splitn(2, KV_SEPARATOR).collect();
            if kv.len() != 2 {
                bail!("key '{}' must have value", kv[0]);
            }
            kvs.set(kv[0].to_owned(), sanitize_value(kv[1]).to_owned());
        }
        Ok(kvs)
    }
}

impl ToString for KVS {
    fn to_string(&self) -> String {
        let mut s = String::new();
        for kv in &self.0 {
            if !s.is_empty() {
                s.push_str(KV_SPACE_SEPARATOR);
            }
            s.push_str(&kv.key);
            s.push_str(KV_SEPARATOR);
            let spc = kv.value.contains(char::is_whitespace);
            if spc {
                s.push_str(KV_DOUBLE_QUOTE);
            }
            s.push_str(&kv.value);
            if spc {
                s.push_str(KV_DOUBLE_QUOTE);
            }
        }
        s
    }
}

// Checks all keys in `kvs` are known to `valid_kvs` of the sub-system.
pub fn check_valid_keys(sub_sys: &str, kvs: &KVS, valid_kvs: &KVS) -> anyhow::Result<()> {
    let mut invalid = Vec::new();
    for kv in kvs.iter() {
        if kv.key == COMMON_KEY {
            continue;
        }
        if valid_kvs.lookup(&kv.key).is_none() {
            invalid.push(kv.key.as_str());
        }
    }
    if !invalid.is_empty() {
        bail!(
            "found invalid keys ({}) for '{}' sub-system",
            invalid.join(","),
            sub_sys
        );
    }
    Ok(())
}

pub fn kv_fields<'a>(input: &'a str, keys: &[&str]) -> Vec<&'a str> {
    let mut value_indexes: Vec<usize> = Vec::with_capacity(keys.len());
    for key in keys {
        let pat = format!("{}{}", key, KV_SEPARATOR);
        // Keys only start a field, `timeout=` must not match `status_timeout=`.
        if let Some(i) = input
            .match_indices(&pat)
            .map(|(i, _)| i)
            .find(|&i| i == 0 || input[..i].ends_with(char::is_whitespace))
        {
            value_indexes.push(i);
        }
    }

    value_indexes.sort_unstable();
    value_indexes
        .iter()
        .enumerate()
        .map(|(i, &index)| {
            let end = value_indexes.get(i + 1).copied().unwrap_or(input.len());
            input[index..end].trim()
        })
        .collect()
}

// Trim off whitespaces, single or double quotes, creeping into the values.
fn sanitize_value(v: &str) -> &str {
    let quotes = KV_DOUBLE_QUOTE
        .chars()
        .chain(KV_SINGLE_QUOTE.chars())
        .collect::<Vec<char>>();
    v.trim().trim_matches(&quotes[..])
}
