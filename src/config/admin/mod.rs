use anyhow::anyhow;
use lazy_static::lazy_static;
use url::Url;

use super::*;
use crate::utils::Duration;

pub const ENDPOINT: &str = "endpoint";
pub const AUTH_TOKEN: &str = "auth_token";
pub const TIMEOUT: &str = "timeout";
pub const STATUS_TIMEOUT: &str = "status_timeout";
pub const POLL_INTERVAL: &str = "poll_interval";

pub const ENV_ENDPOINT: &str = "HULK_HEAL_ADMIN_ENDPOINT";
pub const ENV_AUTH_TOKEN: &str = "HULK_HEAL_ADMIN_AUTH_TOKEN";
pub const ENV_TIMEOUT: &str = "HULK_HEAL_ADMIN_TIMEOUT";
pub const ENV_STATUS_TIMEOUT: &str = "HULK_HEAL_ADMIN_STATUS_TIMEOUT";
pub const ENV_POLL_INTERVAL: &str = "HULK_HEAL_ADMIN_POLL_INTERVAL";

lazy_static! {
    pub static ref DEFAULT_KVS: KVS = KVS(vec![
        KV {
            key: ENDPOINT.to_owned(),
            value: "http://127.0.0.1:9000".to_owned(),
        },
        KV {
            key: AUTH_TOKEN.to_owned(),
            value: "".to_owned(),
        },
        KV {
            key: TIMEOUT.to_owned(),
            value: "1m".to_owned(),
        },
        KV {
            key: STATUS_TIMEOUT.to_owned(),
            value: "10s".to_owned(),
        },
        KV {
            key: POLL_INTERVAL.to_owned(),
            value: "2s".to_owned(),
        },
    ]);
    pub static ref HELP: HelpKVS = HelpKVS(vec![
        HelpKV {
            key: ENDPOINT.to_owned(),
            description: "admin API endpoint of the node to send heal requests to".to_owned(),
            optional: false,
            typ: "url".to_owned(),
        },
        HelpKV {
            key: AUTH_TOKEN.to_owned(),
            description: "bearer token sent in the Authorization header".to_owned(),
            optional: true,
            typ: "string".to_owned(),
        },
        HelpKV {
            key: TIMEOUT.to_owned(),
            description: "timeout of a single heal start/status/stop request. eg. 30s".to_owned(),
            optional: true,
            typ: "duration".to_owned(),
        },
        HelpKV {
            key: STATUS_TIMEOUT.to_owned(),
            description:
                "per node timeout when collecting background heal status. eg. 10s".to_owned(),
            optional: true,
            typ: "duration".to_owned(),
        },
        HelpKV {
            key: POLL_INTERVAL.to_owned(),
            description: "maximum wait between two heal status polls. eg. 2s".to_owned(),
            optional: true,
            typ: "duration".to_owned(),
        },
        HelpKV {
            key: COMMON_KEY.to_owned(),
            description: DEFAULT_COMMENT.to_owned(),
            optional: true,
            typ: "sentence".to_owned(),
        },
    ]);
}

#[derive(Clone, Debug)]
pub struct Config {
    pub endpoint: Url,
    pub auth_token: Option<String>,
    pub timeout: Duration,
    pub status_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        // Safety: defaults are always valid.
        lookup_config_with(&KVS::default(), |_| None).unwrap()
    }
}

pub fn lookup_config(kvs: &KVS) -> anyhow::Result<Config> {
    lookup_config_with(kvs, |key| std::env::var(key).ok())
}

fn lookup_config_with<F>(kvs: &KVS, env: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    check_valid_keys(HEAL_ADMIN_SUB_SYS, kvs, &DEFAULT_KVS)?;

    let get = |env_key: &str, key: &str| {
        env(env_key)
            .or_else(|| kvs.lookup(key).map(ToOwned::to_owned))
            .unwrap_or_else(|| DEFAULT_KVS.get(key).to_owned())
    };
    let duration = |env_key: &str, key: &str| {
        humantime::parse_duration(&get(env_key, key))
            .map_err(|e| anyhow!("heal_admin '{}' value invalid: {}", key, e))
    };

    let endpoint = Url::parse(&get(ENV_ENDPOINT, ENDPOINT))
        .map_err(|e| anyhow!("heal_admin 'endpoint' value invalid: {}", e))?;
    let auth_token = Some(get(ENV_AUTH_TOKEN, AUTH_TOKEN)).filter(|t| !t.is_empty());

    Ok(Config {
        endpoint,
        auth_token,
        timeout: duration(ENV_TIMEOUT, TIMEOUT)?,
        status_timeout: duration(ENV_STATUS_TIMEOUT, STATUS_TIMEOUT)?,
        poll_interval: duration(ENV_POLL_INTERVAL, POLL_INTERVAL)?,
    })
}

#[cfg(test)]
mod tests {
    use maplit::hashmap;

    use super::*;
    use crate::utils;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.endpoint.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(config.auth_token, None);
        assert_eq!(config.timeout, utils::minutes(1));
        assert_eq!(config.status_timeout, utils::seconds(10));
        assert_eq!(config.poll_interval, utils::seconds(2));
    }

    #[test]
    fn test_lookup_config_env_overrides_kvs() {
        let kvs = KVS::parse(
            "endpoint=http://node1:9000 timeout=30s",
            &DEFAULT_KVS.keys(),
        )
        .unwrap();
        let env = hashmap! {
            ENV_TIMEOUT => "5s",
            ENV_AUTH_TOKEN => "secret",
        };
        let config =
            lookup_config_with(&kvs, |key| env.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.endpoint.host_str(), Some("node1"));
        assert_eq!(config.timeout, utils::seconds(5));
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_lookup_config_invalid() {
        let mut kvs = KVS::default();
        kvs.set(TIMEOUT.to_owned(), "soon".to_owned());
        let err = lookup_config_with(&kvs, |_| None).unwrap_err();
        assert!(err.to_string().contains("'timeout' value invalid"));

        let mut kvs = KVS::default();
        kvs.set("bitrot".to_owned(), "on".to_owned());
        assert!(lookup_config_with(&kvs, |_| None).is_err());
    }

    #[test]
    fn test_help_covers_defaults() {
        for kv in DEFAULT_KVS.iter() {
            assert!(HELP.lookup(&kv.key).is_some(), "missing help for {}", kv.key);
        }
    }
}
