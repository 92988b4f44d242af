//! # JOSE: JSON Object Signing and Encryption
//!
//! JOSE is an IETF standard for securely transferring data between parties using JSON.
//! keyward uses two of its components:
//!
//! * JWS (JSON Web Signature): a Header, a Payload and a Signature, all encoded in
//!   Base64Url and joined by dots in the compact serialization.
//!   See [`rfc7515`] for more details.
//!
//! * JWK (JSON Web Key): a JSON format for representing cryptographic keys,
//!   and JWK Sets which group them, typically published at a `jwks_uri`.
//!   See [`rfc7517`] for more details.
//!
//! Keys are kept as the JSON objects they were received as. keyward never needs
//! the key material itself, and comparing two keys must look at every attribute
//! the signer (or the key set publisher) put in them.
//!
//! [`rfc7515`]: https://datatracker.ietf.org/doc/html/rfc7515
//! [`rfc7517`]: https://datatracker.ietf.org/doc/html/rfc7517

mod jwk;
pub use jwk::{JWK, JWKSet, find_by_key_id, is_jwk, is_jwk_set};

mod jws;
pub use jws::{DecodedJWSCompact, MalformedHeader, Payload};

mod value;
