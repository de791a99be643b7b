//! Signature methods of [RFC 5849 section 3.4][rfc].
//!
//! A signature method turns a signature base string and a key into the `oauth_signature` value.
//! All methods are pure functions of their input, the only state is the RSA key material which
//! is read once and shared read-only afterwards.
//!
//! Methods can be constructed directly or resolved from a [`SignatureMethodConfig`]. Building a
//! method whose primitive was compiled out (see the `hmac-sha1` and `rsa-sha1` features) fails
//! with [`Error::Environment`].
//!
//! [rfc]: https://tools.ietf.org/html/rfc5849#section-3.4
//! [`SignatureMethodConfig`]: ../../config/enum.SignatureMethodConfig.html
//! [`Error::Environment`]: ../../error/enum.Error.html#variant.Environment
use std::fmt;
use std::sync::Arc;

use ring::constant_time;

use super::deferred::Resolve;
use crate::config::SignatureMethodConfig;
use crate::error::{Error, Result};

#[cfg(feature = "hmac-sha1")]
pub use self::hmac_sha1::HmacSha1;
#[cfg(feature = "rsa-sha1")]
pub use self::rsa_sha1::RsaSha1;

/// Signs signature base strings.
pub trait SignatureMethod: fmt::Debug + Send + Sync {
    /// The `oauth_signature_method` value, for example `HMAC-SHA1`.
    fn name(&self) -> &'static str;

    /// Compute the signature of `base_string` under `key`.
    ///
    /// The key is `consumer_secret&token_secret`, both parts percent-encoded. Methods based on
    /// asymmetric keys ignore it.
    fn generate_signature(&self, base_string: &str, key: &str) -> Result<String>;

    /// Check a signature.
    ///
    /// The default regenerates the signature and compares in constant time. An empty signature
    /// never verifies, and neither does anything when generation fails.
    fn verify(&self, signature: &str, base_string: &str, key: &str) -> bool {
        if signature.is_empty() {
            return false;
        }

        match self.generate_signature(base_string, key) {
            Ok(expected) if !expected.is_empty() => {
                constant_time::verify_slices_are_equal(expected.as_bytes(), signature.as_bytes())
                    .is_ok()
            }
            _ => false,
        }
    }
}

/// The `PLAINTEXT` method, sending the key itself.
///
/// Provides no protection of the request and must only be used over TLS.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainText;

impl SignatureMethod for PlainText {
    fn name(&self) -> &'static str {
        "PLAINTEXT"
    }

    fn generate_signature(&self, _: &str, key: &str) -> Result<String> {
        Ok(key.to_string())
    }
}

#[cfg(feature = "hmac-sha1")]
mod hmac_sha1 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use ring::hmac;

    use super::SignatureMethod;
    use crate::error::Result;

    /// The `HMAC-SHA1` method.
    ///
    /// The signature is the base64 encoded HMAC-SHA1 of the base string keyed with the joined
    /// secrets.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct HmacSha1;

    impl HmacSha1 {
        fn key(key: &str) -> hmac::Key {
            hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key.as_bytes())
        }
    }

    impl SignatureMethod for HmacSha1 {
        fn name(&self) -> &'static str {
            "HMAC-SHA1"
        }

        fn generate_signature(&self, base_string: &str, key: &str) -> Result<String> {
            let tag = hmac::sign(&HmacSha1::key(key), base_string.as_bytes());
            Ok(STANDARD.encode(tag.as_ref()))
        }

        fn verify(&self, signature: &str, base_string: &str, key: &str) -> bool {
            let tag = match STANDARD.decode(signature) {
                Ok(tag) if !tag.is_empty() => tag,
                _ => return false,
            };
            hmac::verify(&HmacSha1::key(key), base_string.as_bytes(), &tag).is_ok()
        }
    }
}

#[cfg(feature = "rsa-sha1")]
mod rsa_sha1 {
    use std::convert::TryFrom;
    use std::fmt;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use once_cell::sync::OnceCell;
    use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
    use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
    use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
    use rsa::signature::{SignatureEncoding, Signer, Verifier};
    use rsa::{RsaPrivateKey, RsaPublicKey};
    use sha1::Sha1;
    use tracing::debug;

    use super::SignatureMethod;
    use crate::config::KeySource;
    use crate::error::{Error, Result};

    /// The `RSA-SHA1` method, PKCS#1 v1.5 signatures over SHA-1.
    ///
    /// The private key signs, the public key verifies. Either may be given as inline PEM or as a
    /// path to a PEM file, which is read on first use and then kept for the lifetime of the
    /// method. PKCS#8 (`BEGIN PRIVATE KEY`/`BEGIN PUBLIC KEY`) and PKCS#1 (`BEGIN RSA ...`)
    /// encodings are accepted. Without a public key, verification uses the public half of the
    /// private key.
    pub struct RsaSha1 {
        private_source: Option<KeySource>,
        public_source: Option<KeySource>,
        private_key: OnceCell<RsaPrivateKey>,
        public_key: OnceCell<RsaPublicKey>,
    }

    impl RsaSha1 {
        /// Construct from key sources, deferring the reading of files.
        pub fn new(private_key: Option<KeySource>, public_key: Option<KeySource>) -> Self {
            RsaSha1 {
                private_source: private_key,
                public_source: public_key,
                private_key: OnceCell::new(),
                public_key: OnceCell::new(),
            }
        }

        /// Construct from inline PEM and parse it immediately.
        pub fn from_pem(private_pem: Option<&str>, public_pem: Option<&str>) -> Result<Self> {
            let method = RsaSha1::new(
                private_pem.map(|pem| KeySource::Inline(pem.to_string())),
                public_pem.map(|pem| KeySource::Inline(pem.to_string())),
            );
            method.load()?;
            Ok(method)
        }

        /// Read and parse all configured keys now instead of on first use.
        pub fn load(&self) -> Result<()> {
            if self.private_source.is_some() {
                self.private_key()?;
            }
            if self.public_source.is_some() {
                self.public_key()?;
            }
            Ok(())
        }

        fn private_key(&self) -> Result<&RsaPrivateKey> {
            self.private_key.get_or_try_init(|| {
                let source = self
                    .private_source
                    .as_ref()
                    .ok_or_else(|| Error::Key("no private key configured".into()))?;
                debug!(source = %source.describe(), "loading rsa private key");
                let pem = source.read()?;
                RsaPrivateKey::from_pkcs8_pem(&pem)
                    .or_else(|_| RsaPrivateKey::from_pkcs1_pem(&pem))
                    .map_err(|err| Error::Key(format!("private key: {}", err)))
            })
        }

        fn public_key(&self) -> Result<&RsaPublicKey> {
            self.public_key.get_or_try_init(|| match &self.public_source {
                Some(source) => {
                    debug!(source = %source.describe(), "loading rsa public key");
                    let pem = source.read()?;
                    RsaPublicKey::from_public_key_pem(&pem)
                        .or_else(|_| RsaPublicKey::from_pkcs1_pem(&pem))
                        .map_err(|err| Error::Key(format!("public key: {}", err)))
                }
                None => Ok(self.private_key()?.to_public_key()),
            })
        }
    }

    impl SignatureMethod for RsaSha1 {
        fn name(&self) -> &'static str {
            "RSA-SHA1"
        }

        fn generate_signature(&self, base_string: &str, _: &str) -> Result<String> {
            let signing_key = SigningKey::<Sha1>::new(self.private_key()?.clone());
            let signature = signing_key
                .try_sign(base_string.as_bytes())
                .map_err(|err| Error::Key(format!("signing failed: {}", err)))?;
            Ok(STANDARD.encode(signature.to_bytes()))
        }

        fn verify(&self, signature: &str, base_string: &str, _: &str) -> bool {
            let raw = match STANDARD.decode(signature) {
                Ok(raw) if !raw.is_empty() => raw,
                _ => return false,
            };
            let public_key = match self.public_key() {
                Ok(key) => key.clone(),
                Err(_) => return false,
            };
            let signature = match Signature::try_from(raw.as_slice()) {
                Ok(signature) => signature,
                Err(_) => return false,
            };
            VerifyingKey::<Sha1>::new(public_key)
                .verify(base_string.as_bytes(), &signature)
                .is_ok()
        }
    }

    impl fmt::Debug for RsaSha1 {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.debug_struct("RsaSha1")
                .field("private_key", &self.private_source.as_ref().map(KeySource::describe))
                .field("public_key", &self.public_source.as_ref().map(KeySource::describe))
                .finish()
        }
    }
}

/// Construct the method named by a configuration.
pub fn from_config(config: &SignatureMethodConfig) -> Result<Arc<dyn SignatureMethod>> {
    match config {
        SignatureMethodConfig::PlainText => Ok(Arc::new(PlainText)),
        SignatureMethodConfig::HmacSha1 => hmac_sha1_method(),
        SignatureMethodConfig::RsaSha1 { private_key, public_key } => {
            rsa_sha1_method(private_key.clone(), public_key.clone())
        }
    }
}

#[cfg(feature = "hmac-sha1")]
fn hmac_sha1_method() -> Result<Arc<dyn SignatureMethod>> {
    Ok(Arc::new(HmacSha1))
}

#[cfg(not(feature = "hmac-sha1"))]
fn hmac_sha1_method() -> Result<Arc<dyn SignatureMethod>> {
    Err(Error::Environment("HMAC-SHA1"))
}

#[cfg(feature = "rsa-sha1")]
fn rsa_sha1_method(
    private_key: Option<crate::config::KeySource>,
    public_key: Option<crate::config::KeySource>,
) -> Result<Arc<dyn SignatureMethod>> {
    if private_key.is_none() && public_key.is_none() {
        return Err(Error::Config("RSA-SHA1 requires a private or public key".into()));
    }
    Ok(Arc::new(RsaSha1::new(private_key, public_key)))
}

#[cfg(not(feature = "rsa-sha1"))]
fn rsa_sha1_method(
    _: Option<crate::config::KeySource>,
    _: Option<crate::config::KeySource>,
) -> Result<Arc<dyn SignatureMethod>> {
    Err(Error::Environment("RSA-SHA1"))
}

impl Resolve for SignatureMethodConfig {
    type Output = Arc<dyn SignatureMethod>;

    fn resolve(&self) -> Result<Self::Output> {
        from_config(self)
    }
}
