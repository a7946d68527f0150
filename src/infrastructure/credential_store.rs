use crate::infrastructure::error::InfraError;
use std::sync::Mutex;

/// Holds the bearer token issued by the learning platform's auth flow.
pub trait ApiTokenStore: Send + Sync {
    fn save_token(&self, token: &str) -> Result<(), InfraError>;
    fn load_token(&self) -> Result<Option<String>, InfraError>;
    fn delete_token(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct KeyringApiTokenStore {
    service_name: String,
    account_name: String,
}

impl KeyringApiTokenStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringApiTokenStore {
    fn default() -> Self {
        Self::new("focusroom.api", "default")
    }
}

impl ApiTokenStore for KeyringApiTokenStore {
    fn save_token(&self, token: &str) -> Result<(), InfraError> {
        let token = normalize_token(token)?;
        self.entry()?
            .set_password(&token)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    fn load_token(&self) -> Result<Option<String>, InfraError> {
        match self.entry()?.get_password() {
            Ok(value) => Ok(Some(value).filter(|token| !token.trim().is_empty())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryApiTokenStore {
    token: Mutex<Option<String>>,
}

impl InMemoryApiTokenStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl ApiTokenStore for InMemoryApiTokenStore {
    fn save_token(&self, token: &str) -> Result<(), InfraError> {
        let token = normalize_token(token)?;
        let mut guard = self
            .token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(token);
        Ok(())
    }

    fn load_token(&self) -> Result<Option<String>, InfraError> {
        let guard = self
            .token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}

fn normalize_token(token: &str) -> Result<String, InfraError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(InfraError::Credential("api token must not be empty".to_string()));
    }
    Ok(token.to_string())
}
