//! Values that may be given either ready made or as configuration.
//!
//! Credentials are often stored as plain configuration and only turned into usable objects when
//! a request actually needs them. A `Deferred` holds one or the other and resolves the
//! configuration at most once.
use std::sync::Arc;

use super::signature::SignatureMethod;
use super::token::Token;
use crate::config::{SignatureMethodConfig, TokenConfig};
use crate::error::{Error, Result};

/// Configuration that can construct an instance.
pub trait Resolve {
    /// The constructed instance.
    type Output;

    /// Build the instance, failing if the configuration can not be satisfied.
    fn resolve(&self) -> Result<Self::Output>;
}

/// Either a constructed instance or the configuration to construct it from.
#[derive(Clone, Debug)]
pub enum Deferred<C: Resolve> {
    /// Already constructed.
    Ready(C::Output),

    /// Constructed on first use.
    Config(C),
}

impl<C: Resolve> Deferred<C> {
    /// Get the instance, resolving the configuration if this is the first access.
    ///
    /// A failed resolution leaves the configuration in place, so a later call tries again.
    pub fn get(&mut self) -> Result<&C::Output> {
        if let Deferred::Config(config) = self {
            let output = config.resolve()?;
            *self = Deferred::Ready(output);
        }

        match self {
            Deferred::Ready(output) => Ok(output),
            Deferred::Config(_) => Err(Error::Config("configuration was not resolved".into())),
        }
    }

    /// The instance, if it was already constructed.
    pub fn ready(&self) -> Option<&C::Output> {
        match self {
            Deferred::Ready(output) => Some(output),
            Deferred::Config(_) => None,
        }
    }
}

impl From<SignatureMethodConfig> for Deferred<SignatureMethodConfig> {
    fn from(config: SignatureMethodConfig) -> Self {
        Deferred::Config(config)
    }
}

impl From<Arc<dyn SignatureMethod>> for Deferred<SignatureMethodConfig> {
    fn from(method: Arc<dyn SignatureMethod>) -> Self {
        Deferred::Ready(method)
    }
}

impl From<TokenConfig> for Deferred<TokenConfig> {
    fn from(config: TokenConfig) -> Self {
        Deferred::Config(config)
    }
}

impl From<Token> for Deferred<TokenConfig> {
    fn from(token: Token) -> Self {
        Deferred::Ready(token)
    }
}
