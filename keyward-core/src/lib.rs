//! Core primitives shared by the keyward crates.
//!
//! This includes:
//! - error utilities ([`error`]), used by every crate of the workspace;
//! - the [`JwksFetcher`] transport seam, the only way keyward reaches the network;
//! - a wall [`Clock`](time::Clock) abstraction, so cache ages can be driven from tests;
//! - a re-export of [`tracing`](telemetry::tracing).
//!
//! # keyward
//!
//! Crate used by the end-user `keyward` crate and `keyward` crate authors alike.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(clippy::print_stdout, clippy::dbg_macro))]

pub mod error;

pub mod fetch;
pub use fetch::{BoxJwksFetcher, JwksFetcher, fetcher_fn};

pub mod time;

pub mod telemetry {
    //! Telemetry re-exports, for your convenience.

    pub mod tracing {
        //! Re-export of the [`tracing`] crate.
        //!
        //! [`tracing`]: https://docs.rs/tracing

        #[doc(inline)]
        pub use ::tracing::*;
    }
}
