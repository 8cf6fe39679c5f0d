use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

/// One-way credential primitive injected into the user facade.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plain: &str) -> anyhow::Result<String>;

    /// `Ok(false)` on mismatch; `Err` only when `digest` cannot be parsed.
    fn verify(&self, plain: &str, digest: &str) -> anyhow::Result<bool>;
}

/// Argon2id with PHC-string digests.
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl Argon2Hasher {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    pub fn with_costs(m_cost_kib: u32, t_cost: u32, p_cost: u32) -> anyhow::Result<Self> {
        let params = Params::new(m_cost_kib, t_cost, p_cost, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self::new(params))
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    fn verify(&self, plain: &str, digest: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(digest).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        // Parameters come from the digest itself, so older digests keep verifying.
        Ok(self
            .argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }
}
