use crate::error::Error;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use snip_core::UserId;

type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of the identity embedded at the front of a token.
pub const USER_ID_LEN: usize = 16;

/// Issues and verifies signed identity tokens under one server secret.
///
/// The codec holds only the keyed MAC, so it is cheap to clone and safe to
/// share across any number of concurrent requests.
#[derive(Clone)]
pub struct TokenCodec {
    mac: HmacSha256,
}

impl TokenCodec {
    /// Creates a codec keyed by `secret`.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, Error> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(Error::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::InvalidSecret)?;
        Ok(Self { mac })
    }

    /// Mints a fresh identity and returns it with its token.
    pub fn issue(&self) -> (UserId, String) {
        let user_id = UserId::random();
        let token = self.sign(&user_id);
        (user_id, token)
    }

    /// Encodes `user_id` followed by its signature as lowercase hex.
    pub fn sign(&self, user_id: &UserId) -> String {
        let mut mac = self.mac.clone();
        mac.update(user_id.as_bytes());
        let signature = mac.finalize().into_bytes();

        let mut payload = Vec::with_capacity(USER_ID_LEN + signature.len());
        payload.extend_from_slice(user_id.as_bytes());
        payload.extend_from_slice(&signature);
        hex::encode(payload)
    }

    /// Returns the identity carried by `token` if its signature checks out.
    ///
    /// Malformed hex, a payload too short to hold an id and a signature, and
    /// a signature mismatch all yield `None`. The comparison is constant time.
    pub fn verify(&self, token: &str) -> Option<UserId> {
        let payload = hex::decode(token).ok()?;
        if payload.len() <= USER_ID_LEN {
            return None;
        }
        let (id, signature) = payload.split_at(USER_ID_LEN);

        let mut mac = self.mac.clone();
        mac.update(id);
        mac.verify_slice(signature).ok()?;

        let bytes: [u8; USER_ID_LEN] = id.try_into().ok()?;
        Some(UserId::from_bytes(bytes))
    }

    /// Verifies `token` when present, otherwise mints a new identity.
    ///
    /// Always returns the identity to act as and a token to hand back.
    pub fn resolve(&self, token: Option<&str>) -> (UserId, String) {
        match token.and_then(|token| self.verify(token)) {
            Some(user_id) => (user_id, self.sign(&user_id)),
            None => self.issue(),
        }
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}
