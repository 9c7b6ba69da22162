use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use ridgedb_error::{DbError, ErrorKind, Result};

use crate::catalog::sequence::DEFAULT_CACHE_SIZE;
use crate::scalar::ScalarValue;

pub const DEFAULT_MAX_GENERATED_KEYS: u64 = 4096;

/// Configuration for the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Statement timeout in milliseconds, 0 disables the timeout.
    pub query_timeout_ms: u64,
    /// Cache size for sequences created by this session.
    pub sequence_cache_size: u64,
    pub application_name: String,
    /// Most keys a single statement may generate, more fails the statement.
    pub max_generated_keys: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            query_timeout_ms: 0,
            sequence_cache_size: DEFAULT_CACHE_SIZE,
            application_name: String::new(),
            max_generated_keys: DEFAULT_MAX_GENERATED_KEYS,
        }
    }
}

impl SessionConfig {
    pub fn query_timeout(&self) -> Option<Duration> {
        match self.query_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn set_from_scalar(&mut self, name: &str, value: ScalarValue) -> Result<()> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| missing_setting(name))?;

        (func.set)(value, self)
    }

    pub fn get_as_scalar(&self, name: &str) -> Result<ScalarValue> {
        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| missing_setting(name))?;

        Ok((func.get)(self))
    }

    pub fn reset(&mut self, name: &str) -> Result<()> {
        let def_conf = Self::default();

        let func = GET_SET_FUNCTIONS
            .get(name)
            .ok_or_else(|| missing_setting(name))?;

        let scalar = (func.get)(&def_conf);
        (func.set)(scalar, self)
    }

    pub fn reset_all(&mut self) {
        *self = Self::default();
    }
}

fn missing_setting(name: &str) -> DbError {
    DbError::new_kind(ErrorKind::ObjectNotFound, format!("Missing setting for '{name}'"))
}

struct SettingFunctions {
    set: fn(scalar: ScalarValue, conf: &mut SessionConfig) -> Result<()>,
    get: fn(conf: &SessionConfig) -> ScalarValue,
}

impl SettingFunctions {
    const fn new<S: SessionSetting>() -> Self {
        SettingFunctions {
            set: S::set_from_scalar as _,
            get: S::get_as_scalar as _,
        }
    }
}

fn insert_setting<S: SessionSetting>(map: &mut HashMap<&'static str, SettingFunctions>) {
    if map.insert(S::NAME, SettingFunctions::new::<S>()).is_some() {
        panic!("Duplicate settings names: {}", S::NAME);
    }
}

static GET_SET_FUNCTIONS: LazyLock<HashMap<&'static str, SettingFunctions>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    insert_setting::<QueryTimeout>(&mut map);
    insert_setting::<SequenceCacheSize>(&mut map);
    insert_setting::<ApplicationName>(&mut map);
    insert_setting::<MaxGeneratedKeys>(&mut map);

    map
});

pub trait SessionSetting: Sync + Send + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn set_from_scalar(scalar: ScalarValue, conf: &mut SessionConfig) -> Result<()>;
    fn get_as_scalar(conf: &SessionConfig) -> ScalarValue;
}

/// Parse a non-negative integer setting, rejecting negative values without
/// touching the config.
fn non_negative(name: &'static str, scalar: &ScalarValue) -> Result<u64> {
    let val = scalar.try_as_i64()?;
    if val < 0 {
        return Err(DbError::new_kind(ErrorKind::InvalidValue, "Invalid value")
            .with_field("setting", name)
            .with_field("value", val));
    }
    Ok(val as u64)
}

pub struct QueryTimeout;

impl SessionSetting for QueryTimeout {
    const NAME: &'static str = "query_timeout_ms";
    const DESCRIPTION: &'static str = "Statement timeout in milliseconds, 0 for no timeout";

    fn set_from_scalar(scalar: ScalarValue, conf: &mut SessionConfig) -> Result<()> {
        conf.query_timeout_ms = non_negative(Self::NAME, &scalar)?;
        Ok(())
    }

    fn get_as_scalar(conf: &SessionConfig) -> ScalarValue {
        (conf.query_timeout_ms as i64).into()
    }
}

pub struct SequenceCacheSize;

impl SessionSetting for SequenceCacheSize {
    const NAME: &'static str = "sequence_cache_size";
    const DESCRIPTION: &'static str = "Number of sequence values reserved per catalog write";

    fn set_from_scalar(scalar: ScalarValue, conf: &mut SessionConfig) -> Result<()> {
        let val = non_negative(Self::NAME, &scalar)?;
        if val == 0 {
            return Err(
                DbError::new_kind(ErrorKind::InvalidValue, "Cache size cannot be zero")
                    .with_field("setting", Self::NAME),
            );
        }
        conf.sequence_cache_size = val;
        Ok(())
    }

    fn get_as_scalar(conf: &SessionConfig) -> ScalarValue {
        (conf.sequence_cache_size as i64).into()
    }
}

pub struct ApplicationName;

impl SessionSetting for ApplicationName {
    const NAME: &'static str = "application_name";
    const DESCRIPTION: &'static str = "Client supplied application name";

    fn set_from_scalar(scalar: ScalarValue, conf: &mut SessionConfig) -> Result<()> {
        conf.application_name = scalar.try_as_str()?.to_string();
        Ok(())
    }

    fn get_as_scalar(conf: &SessionConfig) -> ScalarValue {
        conf.application_name.clone().into()
    }
}

pub struct MaxGeneratedKeys;

impl SessionSetting for MaxGeneratedKeys {
    const NAME: &'static str = "max_generated_keys";
    const DESCRIPTION: &'static str = "Maximum number of generated keys kept per statement";

    fn set_from_scalar(scalar: ScalarValue, conf: &mut SessionConfig) -> Result<()> {
        let val = non_negative(Self::NAME, &scalar)?;
        if val == 0 {
            return Err(DbError::new_kind(
                ErrorKind::InvalidValue,
                "Generated key limit cannot be zero",
            ));
        }
        conf.max_generated_keys = val;
        Ok(())
    }

    fn get_as_scalar(conf: &SessionConfig) -> ScalarValue {
        (conf.max_generated_keys as i64).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_setting_exists() {
        let mut conf = SessionConfig::default();
        conf.set_from_scalar("application_name", "test".into())
            .unwrap();

        let val = conf.get_as_scalar("application_name").unwrap();
        assert_eq!("test", val.try_as_str().unwrap());
    }

    #[test]
    fn set_setting_not_exists() {
        let mut conf = SessionConfig::default();
        let err = conf.set_from_scalar("hello_world", 58.into()).unwrap_err();
        assert_eq!(ErrorKind::ObjectNotFound, err.kind());
    }

    #[test]
    fn negative_timeout_rejected_and_unchanged() {
        let mut conf = SessionConfig::default();
        conf.set_from_scalar("query_timeout_ms", 10.into()).unwrap();

        let err = conf
            .set_from_scalar("query_timeout_ms", (-1).into())
            .unwrap_err();
        assert_eq!(ErrorKind::InvalidValue, err.kind());
        assert_eq!(Some(Duration::from_millis(10)), conf.query_timeout());

        conf.set_from_scalar("query_timeout_ms", 0.into()).unwrap();
        assert_eq!(None, conf.query_timeout());
    }

    #[test]
    fn reset_single_setting() {
        let mut conf = SessionConfig::default();
        conf.set_from_scalar("sequence_cache_size", 4.into()).unwrap();
        conf.set_from_scalar("application_name", "app".into()).unwrap();

        conf.reset("sequence_cache_size").unwrap();
        assert_eq!(DEFAULT_CACHE_SIZE, conf.sequence_cache_size);
        assert_eq!("app", conf.application_name);

        conf.reset_all();
        assert_eq!(SessionConfig::default(), conf);
    }

    #[test]
    fn zero_cache_size_rejected() {
        let mut conf = SessionConfig::default();
        conf.set_from_scalar("sequence_cache_size", 0.into())
            .unwrap_err();
        assert_eq!(DEFAULT_CACHE_SIZE, conf.sequence_cache_size);
    }
}
