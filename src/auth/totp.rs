//! RFC 6238 time-based one-time passwords (HMAC-SHA1, 30 s step, 6 digits),
//! as required by the SmartAPI password login.

use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::error::AuthError;

const STEP_SECS: u64 = 30;
const DIGITS: u32 = 6;

/// TOTP generator for a base32 shared secret.
#[derive(Clone)]
pub struct Totp {
    mac: Hmac<Sha1>,
}

impl Totp {
    /// Parse a base32 secret. Spaces, dashes, padding and case are ignored.
    pub fn from_base32(secret: &str) -> Result<Self, AuthError> {
        let secret = decode_base32(secret).ok_or_else(|| {
            AuthError::Configuration("ANGEL_TOTP_SECRET is not valid base32".into())
        })?;
        if secret.is_empty() {
            return Err(AuthError::Configuration(
                "ANGEL_TOTP_SECRET is empty".into(),
            ));
        }
        let mac = Hmac::<Sha1>::new_from_slice(&secret)
            .map_err(|err| AuthError::Configuration(format!("ANGEL_TOTP_SECRET: {err}")))?;
        Ok(Self { mac })
    }

    /// Code for the current wall-clock time.
    pub fn now(&self) -> String {
        let unix = chrono::Utc::now().timestamp().max(0) as u64;
        self.at(unix)
    }

    /// Code for a given Unix timestamp.
    pub fn at(&self, unix_secs: u64) -> String {
        let counter = unix_secs / STEP_SECS;
        let mut mac = self.mac.clone();
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        let offset = (digest[digest.len() - 1] & 0x0f) as usize;
        let binary = u32::from_be_bytes([
            digest[offset] & 0x7f,
            digest[offset + 1],
            digest[offset + 2],
            digest[offset + 3],
        ]);
        let code = binary % 10u32.pow(DIGITS);
        format!("{code:0width$}", width = DIGITS as usize)
    }
}

fn decode_base32(input: &str) -> Option<Vec<u8>> {
    let mut buffer: u64 = 0;
    let mut bits = 0u32;
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    for ch in input.chars() {
        if ch == '=' || ch == ' ' || ch == '-' {
            continue;
        }
        let value = match ch.to_ascii_uppercase() {
            c @ 'A'..='Z' => c as u64 - 'A' as u64,
            c @ '2'..='7' => c as u64 - '2' as u64 + 26,
            _ => return None,
        };
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }
    Some(out)
}
