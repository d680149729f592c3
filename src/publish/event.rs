//! Addressable wiki events
//!
//! Articles are published as kind 30818 and redirects as kind 30819. Both are
//! addressed by their `d` tag (the document identifier), so republishing an
//! identifier replaces the previous version at the relay.

use crate::import::ImportError;
use crate::types::{Document, DocumentKind};
use secp256k1::{schnorr, All, Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use serde_json::ser::{CharEscape, CompactFormatter, Formatter, Serializer};
use sha2::{Digest, Sha256};
use std::io;

pub const KIND_METADATA: u16 = 0;
pub const KIND_WIKI_ARTICLE: u16 = 30818;
pub const KIND_WIKI_REDIRECT: u16 = 30819;

/// Signing key pair
#[derive(Clone)]
pub struct Keys {
    secp: Secp256k1<All>,
    keypair: Keypair,
    public_key: XOnlyPublicKey,
}

impl Keys {
    /// Parse a 32-byte secret key given as 64 hex characters
    pub fn from_hex(secret: &str) -> Result<Self, ImportError> {
        let bytes = hex::decode(secret.trim())
            .map_err(|e| ImportError::Signing(format!("secret key is not hex: {}", e)))?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| ImportError::Signing(format!("invalid secret key: {}", e)))?;

        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &secret_key);
        let (public_key, _parity) = keypair.x_only_public_key();

        Ok(Self {
            secp,
            keypair,
            public_key,
        })
    }

    /// Hex x-only public key, as used in the `pubkey` field
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    fn sign(&self, id: [u8; 32]) -> schnorr::Signature {
        let message = Message::from_digest(id);
        self.secp.sign_schnorr_no_aux_rand(&message, &self.keypair)
    }
}

impl std::fmt::Debug for Keys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keys")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Unsigned event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTemplate {
    pub created_at: i64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
}

impl EventTemplate {
    /// Build the wiki event for a document
    pub fn from_document(doc: &Document, created_at: i64) -> Self {
        let mut tags = vec![
            vec!["d".to_string(), doc.identifier.clone()],
            vec!["title".to_string(), doc.title.clone()],
        ];

        let kind = match doc.kind {
            DocumentKind::Article => KIND_WIKI_ARTICLE,
            DocumentKind::Redirect => {
                if let Some(target) = &doc.redirect_target {
                    tags.push(vec!["redirect".to_string(), target.clone()]);
                }
                KIND_WIKI_REDIRECT
            }
        };

        Self {
            created_at,
            kind,
            tags,
            content: doc.body.clone(),
        }
    }

    /// Compute the id and sign it
    pub fn sign(self, keys: &Keys) -> Result<SignedEvent, ImportError> {
        let pubkey = keys.public_key_hex();
        let id = event_id(&pubkey, self.created_at, self.kind, &self.tags, &self.content)?;
        let sig = keys.sign(id);

        Ok(SignedEvent {
            id: hex::encode(id),
            pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig: hex::encode(sig.serialize()),
        })
    }
}

/// Event as sent to and received from relays
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

impl SignedEvent {
    /// First value of the tag called `name`
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.first().map(String::as_str) == Some(name))
            .and_then(|t| t.get(1))
            .map(String::as_str)
    }

    /// Check that the id matches the content and the signature matches the id
    pub fn verify(&self) -> Result<(), ImportError> {
        let id = event_id(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content)?;
        if hex::encode(id) != self.id {
            return Err(ImportError::Signing(format!("event {} has a mismatched id", self.id)));
        }

        let invalid = |what: &str| ImportError::Signing(format!("event {} has an invalid {}", self.id, what));
        let pubkey = hex::decode(&self.pubkey)
            .ok()
            .and_then(|b| XOnlyPublicKey::from_slice(&b).ok())
            .ok_or_else(|| invalid("pubkey"))?;
        let sig = hex::decode(&self.sig)
            .ok()
            .and_then(|b| schnorr::Signature::from_slice(&b).ok())
            .ok_or_else(|| invalid("signature"))?;

        Secp256k1::verification_only()
            .verify_schnorr(&sig, &Message::from_digest(id), &pubkey)
            .map_err(|_| invalid("signature"))
    }
}

/// Compact JSON that escapes only `"`, `\\` and the named controls
/// `\b \t \n \f \r`; every other control byte is written raw.
struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn write_char_escape<W>(&mut self, writer: &mut W, char_escape: CharEscape) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        match char_escape {
            CharEscape::AsciiControl(byte) => writer.write_all(&[byte]),
            other => CompactFormatter.write_char_escape(writer, other),
        }
    }
}

/// Serialize `[0, pubkey, created_at, kind, tags, content]` for hashing
fn canonical_json(
    pubkey: &str,
    created_at: i64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> Result<Vec<u8>, ImportError> {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, CanonicalFormatter);
    (0, pubkey, created_at, kind, tags, content).serialize(&mut serializer)?;
    Ok(out)
}

/// SHA-256 over the canonical serialization
fn event_id(
    pubkey: &str,
    created_at: i64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> Result<[u8; 32], ImportError> {
    let canonical = canonical_json(pubkey, created_at, kind, tags, content)?;
    Ok(Sha256::digest(&canonical).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0000000000000000000000000000000000000000000000000000000000000003";

    fn keys() -> Keys {
        Keys::from_hex(SECRET).unwrap()
    }

    #[test]
    fn test_public_key_derivation() {
        // BIP-340 test vector 0
        assert_eq!(
            keys().public_key_hex(),
            "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9"
        );
    }

    #[test]
    fn test_rejects_bad_secret_keys() {
        assert!(matches!(Keys::from_hex("nsec1xyz"), Err(ImportError::Signing(_))));
        assert!(matches!(Keys::from_hex("abcd"), Err(ImportError::Signing(_))));
        assert!(matches!(Keys::from_hex(&"0".repeat(64)), Err(ImportError::Signing(_))));
    }

    #[test]
    fn test_article_event_tags() {
        let doc = Document::article("Beta (album)", "body").unwrap();
        let template = EventTemplate::from_document(&doc, 1_700_000_000);

        assert_eq!(template.kind, KIND_WIKI_ARTICLE);
        assert_eq!(
            template.tags,
            vec![
                vec!["d".to_string(), "beta-album".to_string()],
                vec!["title".to_string(), "Beta (album)".to_string()],
            ]
        );
        assert_eq!(template.content, "body");
    }

    #[test]
    fn test_redirect_event_tags() {
        let doc = Document::article("Source Page", "x")
            .unwrap()
            .into_redirect("target-page".to_string(), String::new());
        let event = EventTemplate::from_document(&doc, 1).sign(&keys()).unwrap();

        assert_eq!(event.kind, KIND_WIKI_REDIRECT);
        assert_eq!(event.tag("d"), Some("source-page"));
        assert_eq!(event.tag("redirect"), Some("target-page"));
    }

    #[test]
    fn test_signed_event_verifies() {
        let doc = Document::article("Alpha", "Line one\n\"quoted\" \\ tab\t").unwrap();
        let event = EventTemplate::from_document(&doc, 1_700_000_000)
            .sign(&keys())
            .unwrap();

        assert_eq!(event.id.len(), 64);
        assert_eq!(event.sig.len(), 128);
        event.verify().unwrap();

        // Round trip through JSON keeps it valid
        let json = serde_json::to_string(&event).unwrap();
        let parsed: SignedEvent = serde_json::from_str(&json).unwrap();
        parsed.verify().unwrap();
    }

    #[test]
    fn test_tampering_breaks_verification() {
        let doc = Document::article("Alpha", "original").unwrap();
        let mut event = EventTemplate::from_document(&doc, 1).sign(&keys()).unwrap();
        event.content = "changed".to_string();
        assert!(event.verify().is_err());
    }

    #[test]
    fn test_id_is_deterministic() {
        let doc = Document::article("Alpha", "body").unwrap();
        let a = EventTemplate::from_document(&doc, 42).sign(&keys()).unwrap();
        let b = EventTemplate::from_document(&doc, 42).sign(&keys()).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.sig, b.sig);
    }

    #[test]
    fn test_canonical_json_keeps_control_bytes_raw() {
        let tags = vec![vec!["d".to_string(), "alpha".to_string()]];
        let canonical = canonical_json("ab", 7, KIND_WIKI_ARTICLE, &tags, "x\u{1}y\n\"z\"\t\u{1f}").unwrap();
        let canonical = String::from_utf8(canonical).unwrap();

        assert_eq!(
            canonical,
            "[0,\"ab\",7,30818,[[\"d\",\"alpha\"]],\"x\u{1}y\\n\\\"z\\\"\\t\u{1f}\"]"
        );
        assert!(!canonical.contains("\\u00"));
    }

    #[test]
    fn test_event_with_control_bytes_verifies() {
        let doc = Document::article("Alpha", "bell \u{7} here").unwrap();
        let event = EventTemplate::from_document(&doc, 1).sign(&keys()).unwrap();
        event.verify().unwrap();
    }
}
