use std::{
    collections::{HashMap, hash_map::Iter},
    fmt::Display,
    str::FromStr,
};

use thiserror::Error;

/// Raw `key = value` pairs of one configuration section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleConfig {
    inner: HashMap<String, String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{value} is not a valid value for field {field}: {err}")]
    InvalidValue {
        field: String,
        value: String,
        err: String,
    },
}

impl ModuleConfig {
    pub fn insert(&mut self, key: String, value: String) -> Option<String> {
        self.inner.insert(key, value)
    }

    /// Typed value of `field`, or `default` when the section doesn't set it.
    pub fn with_default<T>(&self, field: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.inner.get(field) {
            Some(value) => parse(field, value),
            None => Ok(default),
        }
    }

    /// Comma separated values of `field`. Empty items are skipped and a
    /// missing field is an empty list.
    pub fn get_list<T>(&self, field: &str) -> Result<Vec<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get_list_with_default(field, Vec::new())
    }

    /// Like [`ModuleConfig::get_list`], with `default` for a missing field.
    pub fn get_list_with_default<T>(&self, field: &str, default: Vec<T>) -> Result<Vec<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let Some(list) = self.inner.get(field) else {
            return Ok(default);
        };
        list.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| parse(field, item))
            .collect()
    }

    pub fn iter(&self) -> Iter<'_, String, String> {
        self.inner.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ModuleConfig {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

fn parse<T>(field: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        err: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ModuleConfig {
        ModuleConfig::from_iter([
            ("port", "22"),
            ("ports", "22, 80,,443"),
            ("bad", "x"),
            ("empty", ""),
        ])
    }

    #[test]
    fn typed_values() {
        let config = config();
        assert_eq!(config.with_default("port", 7u16), Ok(22));
        assert_eq!(config.with_default("missing", 7u16), Ok(7));
        assert_eq!(
            config.with_default("bad", 7u16),
            Err(ConfigError::InvalidValue {
                field: "bad".to_string(),
                value: "x".to_string(),
                err: "invalid digit found in string".to_string(),
            })
        );
    }

    #[test]
    fn lists() {
        let config = config();
        assert_eq!(config.get_list::<u16>("ports"), Ok(vec![22, 80, 443]));
        assert_eq!(config.get_list::<u16>("empty"), Ok(vec![]));
        assert_eq!(config.get_list::<u16>("missing"), Ok(vec![]));
        assert_eq!(config.get_list_with_default("missing", vec![2u32]), Ok(vec![2]));
        assert_eq!(config.get_list_with_default("empty", vec![2u32]), Ok(vec![]));
        assert!(config.get_list::<u16>("bad").is_err());
    }
}
