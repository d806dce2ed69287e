//! Node-ID handshake cookies.
//!
//! A connecting peer is challenged with a random 256-bit cookie; signing it
//! proves control of the claimed node identity. Issuance is capped per IP
//! so a single host cannot exhaust the table.

use std::collections::HashMap;
use std::net::{Ipv6Addr, SocketAddrV6};
use std::time::Instant;

use almond_types::{Account, Signature};

/// Outstanding cookie issuances allowed per IP.
const MAX_COOKIES_PER_IP: u32 = 10;

struct SynCookieInfo {
    cookie: [u8; 32],
    created_at: Instant,
}

/// Pending handshake challenges, keyed by endpoint.
pub struct SynCookies {
    cookies: HashMap<SocketAddrV6, SynCookieInfo>,
    cookies_per_ip: HashMap<Ipv6Addr, u32>,
}

impl SynCookies {
    pub fn new() -> Self {
        Self {
            cookies: HashMap::new(),
            cookies_per_ip: HashMap::new(),
        }
    }

    /// Issue a cookie for an endpoint. Returns `None` when the endpoint
    /// already holds one or its IP is at the issuance cap.
    pub fn assign(&mut self, endpoint: &SocketAddrV6) -> Option<[u8; 32]> {
        if self.cookies.contains_key(endpoint) {
            return None;
        }
        let ip = *endpoint.ip();
        let per_ip = self.cookies_per_ip.entry(ip).or_insert(0);
        if *per_ip >= MAX_COOKIES_PER_IP {
            return None;
        }

        let mut cookie = [0u8; 32];
        getrandom::getrandom(&mut cookie).ok()?;
        *per_ip += 1;
        self.cookies.insert(
            *endpoint,
            SynCookieInfo {
                cookie,
                created_at: Instant::now(),
            },
        );
        Some(cookie)
    }

    /// Check a handshake response. A valid signature over the issued cookie
    /// consumes it; the cookie is also consumed on failure so it cannot be
    /// ground down by repeated guesses.
    pub fn validate(
        &mut self,
        endpoint: &SocketAddrV6,
        node_id: &Account,
        signature: &Signature,
    ) -> bool {
        let Some(info) = self.cookies.remove(endpoint) else {
            return false;
        };
        self.decrement_ip(endpoint.ip());
        almond_crypto::validate_message(node_id, &info.cookie, signature)
    }

    /// Drop cookies issued before `cutoff`.
    pub fn purge(&mut self, cutoff: Instant) {
        let expired: Vec<SocketAddrV6> = self
            .cookies
            .iter()
            .filter(|(_, info)| info.created_at < cutoff)
            .map(|(endpoint, _)| *endpoint)
            .collect();
        for endpoint in expired {
            self.cookies.remove(&endpoint);
            self.decrement_ip(endpoint.ip());
        }
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    fn decrement_ip(&mut self, ip: &Ipv6Addr) {
        if let Some(count) = self.cookies_per_ip.get_mut(ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.cookies_per_ip.remove(ip);
            }
        }
    }
}

impl Default for SynCookies {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use almond_crypto::KeyPair;
    use std::time::Duration;

    fn endpoint(port: u16) -> SocketAddrV6 {
        SocketAddrV6::new(Ipv6Addr::LOCALHOST, port, 0, 0)
    }

    #[test]
    fn assign_and_validate() {
        let mut cookies = SynCookies::new();
        let peer = endpoint(24000);
        let cookie = cookies.assign(&peer).unwrap();

        let key = KeyPair::generate();
        let signature = almond_crypto::sign_message(&key.secret, &cookie);
        assert!(cookies.validate(&peer, &key.public, &signature));
        assert!(cookies.is_empty());
    }

    #[test]
    fn double_assign_is_refused() {
        let mut cookies = SynCookies::new();
        let peer = endpoint(24000);
        assert!(cookies.assign(&peer).is_some());
        assert!(cookies.assign(&peer).is_none());
    }

    #[test]
    fn per_ip_cap_enforced() {
        let mut cookies = SynCookies::new();
        for port in 0..MAX_COOKIES_PER_IP as u16 {
            assert!(cookies.assign(&endpoint(10000 + port)).is_some());
        }
        assert!(cookies.assign(&endpoint(20000)).is_none());
    }

    #[test]
    fn validate_consumes_cookie_even_on_failure() {
        let mut cookies = SynCookies::new();
        let peer = endpoint(24000);
        cookies.assign(&peer).unwrap();

        let key = KeyPair::generate();
        let wrong = almond_crypto::sign_message(&key.secret, b"not the cookie");
        assert!(!cookies.validate(&peer, &key.public, &wrong));
        assert!(cookies.is_empty());
        // A fresh cookie can be assigned again.
        assert!(cookies.assign(&peer).is_some());
    }

    #[test]
    fn wrong_identity_fails() {
        let mut cookies = SynCookies::new();
        let peer = endpoint(24000);
        let cookie = cookies.assign(&peer).unwrap();

        let signer = KeyPair::generate();
        let claimed = KeyPair::generate();
        let signature = almond_crypto::sign_message(&signer.secret, &cookie);
        assert!(!cookies.validate(&peer, &claimed.public, &signature));
    }

    #[test]
    fn purge_frees_ip_budget() {
        let mut cookies = SynCookies::new();
        for port in 0..MAX_COOKIES_PER_IP as u16 {
            cookies.assign(&endpoint(10000 + port)).unwrap();
        }
        cookies.purge(Instant::now() + Duration::from_secs(1));
        assert!(cookies.is_empty());
        assert!(cookies.assign(&endpoint(20000)).is_some());
    }
}
