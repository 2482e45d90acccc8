//! Cookie medium and the cookie helpers shared with the route guard and the
//! page shell.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use http::header::COOKIE;
use http::HeaderMap;
use parking_lot::Mutex;

use super::base::{Medium, StoreError, StoredValue};

/// Reads cookie `name` from every `Cookie` header on a request.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value persisting `name=value` for `max_age`.
pub fn set_cookie(name: &str, value: &str, max_age: Duration) -> String {
    format!(
        "{}={}; Path=/; Max-Age={}; SameSite=Lax",
        name,
        value,
        max_age.as_secs()
    )
}

/// `Set-Cookie` value deleting cookie `name`.
pub fn clear_cookie(name: &str) -> String {
    format!("{}=; Path=/; Max-Age=0; SameSite=Lax", name)
}

/// Client-side cookie jar honouring `Max-Age`.
#[derive(Default)]
pub struct CookieJar {
    cookies: Mutex<HashMap<String, StoredValue>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `Cookie` request header value for every live cookie, if any.
    pub fn header_value(&self) -> Option<String> {
        let cookies = self.cookies.lock();
        let mut pairs: Vec<String> = cookies
            .iter()
            .filter(|(_, stored)| stored.is_live())
            .map(|(name, stored)| format!("{}={}", name, stored.value))
            .collect();
        if pairs.is_empty() {
            return None;
        }
        pairs.sort();
        Some(pairs.join("; "))
    }
}

#[async_trait]
impl Medium for CookieJar {
    fn name(&self) -> &str {
        "cookie"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut cookies = self.cookies.lock();
        match cookies.get(key) {
            Some(stored) if stored.is_live() => Ok(Some(stored.value.clone())),
            Some(_) => {
                cookies.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, retention: Duration) -> Result<(), StoreError> {
        self.cookies
            .lock()
            .insert(key.to_string(), StoredValue::new(value, retention));
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.cookies.lock().remove(key);
        Ok(())
    }
}
