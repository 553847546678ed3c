use std::fmt;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

pub const RECV_WINDOW_MS: u64 = 5000;
pub const REDACTED: &str = "[REDACTED]";

/// Keys the signer stamps itself. Caller-supplied copies are discarded.
const RESERVED_KEYS: [&str; 3] = ["timestamp", "recvWindow", "signature"];

/// Lowercase hex HMAC-SHA256 of `msg` keyed with `secret_key`.
pub fn signature(secret_key: &[u8], msg: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret_key)
        .expect("HMAC can take keys of any size");
    mac.update(msg.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Signs the query string of `params` exactly as it will be sent.
pub fn sign(secret: &str, params: &QueryParams) -> String {
    signature(secret.as_bytes(), &params.to_query_string())
}

/// Ordered `key=value` request parameters. Insertion order is the signed
/// byte order, so two sets with the same pairs in a different order produce
/// different signatures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Form-urlencoded `k=v&k=v` in insertion order.
    pub fn to_query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }

    /// Copy safe to log: the signature value is replaced.
    pub fn redacted(&self) -> QueryParams {
        let pairs = self
            .pairs
            .iter()
            .map(|(k, v)| {
                if k == "signature" {
                    (k.clone(), REDACTED.to_string())
                } else {
                    (k.clone(), v.clone())
                }
            })
            .collect();
        QueryParams { pairs }
    }

    fn without_reserved(mut self) -> Self {
        self.pairs
            .retain(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()));
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let pairs = iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        QueryParams { pairs }
    }
}

/// Caller parameters followed by `timestamp`, `recvWindow` and, last,
/// `signature`. Built for one request and never reused.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedParameters {
    params: QueryParams,
    timestamp: i64,
    signature: String,
}

impl SignedParameters {
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Every parameter including the trailing signature.
    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    pub fn to_query_string(&self) -> String {
        self.params.to_query_string()
    }

    pub fn redacted(&self) -> QueryParams {
        self.params.redacted()
    }
}

impl fmt::Debug for SignedParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedParameters")
            .field("params", &self.params.redacted())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Holds the API secret and stamps requests with the exchange-mandated fields.
#[derive(Clone)]
pub struct Signer {
    secret: String,
    recv_window: u64,
}

impl Signer {
    pub fn new(secret: impl Into<String>, recv_window: u64) -> Self {
        Self {
            secret: secret.into(),
            recv_window,
        }
    }

    pub fn recv_window(&self) -> u64 {
        self.recv_window
    }

    /// Signs `params` with the current wall-clock time.
    pub fn sign_params(&self, params: QueryParams) -> SignedParameters {
        self.sign_params_at(params, Utc::now().timestamp_millis())
    }

    pub fn sign_params_at(&self, params: QueryParams, timestamp: i64) -> SignedParameters {
        let mut params = params.without_reserved();
        params.push("timestamp", timestamp.to_string());
        params.push("recvWindow", self.recv_window.to_string());

        let signature = sign(&self.secret, &params);
        params.push("signature", signature.clone());

        SignedParameters {
            params,
            timestamp,
            signature,
        }
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("secret", &REDACTED)
            .field("recv_window", &self.recv_window)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC_SECRET: &str = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";

    fn order() -> QueryParams {
        QueryParams::new()
            .with("symbol", "BTCUSDT")
            .with("side", "BUY")
            .with("type", "MARKET")
            .with("quantity", "0.001")
    }

    #[test]
    fn test_known_signature() {
        let msg = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            signature(DOC_SECRET.as_bytes(), msg),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_signing_is_deterministic() {
        let first = sign("secret", &order());
        let second = sign("secret", &order());
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_any_change_alters_signature() {
        let base = sign("secret", &order());
        assert_ne!(base, sign("secret2", &order()));

        for qty in ["0.002", "0.0010", "1", "10.5", "0.00099"] {
            let changed = QueryParams::new()
                .with("symbol", "BTCUSDT")
                .with("side", "BUY")
                .with("type", "MARKET")
                .with("quantity", qty);
            assert_ne!(base, sign("secret", &changed), "quantity {}", qty);
        }
    }

    #[test]
    fn test_signing_is_order_sensitive() {
        let reordered = QueryParams::new()
            .with("side", "BUY")
            .with("symbol", "BTCUSDT")
            .with("type", "MARKET")
            .with("quantity", "0.001");

        assert_ne!(order().to_query_string(), reordered.to_query_string());
        assert_ne!(sign("secret", &order()), sign("secret", &reordered));
    }

    #[test]
    fn test_signature_is_last_and_covers_prefix() {
        let signer = Signer::new("secret", RECV_WINDOW_MS);
        let signed = signer.sign_params_at(order(), 1_700_000_000_000);

        let keys: Vec<&str> = signed.params().keys().collect();
        assert_eq!(
            keys,
            ["symbol", "side", "type", "quantity", "timestamp", "recvWindow", "signature"]
        );
        assert_eq!(signed.params().get("recvWindow"), Some("5000"));

        let unsigned = "symbol=BTCUSDT&side=BUY&type=MARKET&quantity=0.001&timestamp=1700000000000&recvWindow=5000";
        assert_eq!(signed.signature(), signature(b"secret", unsigned));
        assert_eq!(
            signed.to_query_string(),
            format!("{}&signature={}", unsigned, signed.signature())
        );
    }

    #[test]
    fn test_caller_cannot_supply_reserved_fields() {
        let signer = Signer::new("secret", RECV_WINDOW_MS);
        let tampered = order()
            .with("timestamp", "1")
            .with("signature", "deadbeef");
        let signed = signer.sign_params_at(tampered, 42);

        assert_eq!(signed, signer.sign_params_at(order(), 42));
    }

    #[test]
    fn test_query_string_percent_encodes() {
        let params = QueryParams::new().with("note", "a b&c=d");
        assert_eq!(params.to_query_string(), "note=a+b%26c%3Dd");
    }

    #[test]
    fn test_redaction_hides_signature_and_secret() {
        let signer = Signer::new("top-secret", RECV_WINDOW_MS);
        let signed = signer.sign_params_at(order(), 1);

        let redacted = signed.redacted();
        assert_eq!(redacted.get("signature"), Some(REDACTED));
        assert_eq!(redacted.get("symbol"), Some("BTCUSDT"));

        let debug = format!("{:?} {:?}", signed, signer);
        assert!(!debug.contains(signed.signature()));
        assert!(!debug.contains("top-secret"));
    }
}
