//! Crypto data types used by keyward.
//!
//! This includes but is not limited to:
//! - Javascript object signing and encryption (JOSE): JWS and JWK.
//!
//! Only key *selection* lives here. Nothing in this crate verifies a signature.
//!
//! # keyward
//!
//! Crate used by the end-user `keyward` crate and `keyward` crate authors alike.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

pub mod jose;
