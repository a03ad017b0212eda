//! buildgate core - signed build admission decisions
//!
//! This crate holds the decision pipeline of the gate: HTTP signature
//! verification, build request decoding, author policy resolution and the
//! mapping of dispositions to HTTP status codes.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod decision;
pub mod error;
pub mod policy;
pub mod request;
pub mod signature;

pub use decision::{encode, Decision, ErrorBody, STATUS_NEEDS_VERIFICATION};
pub use error::{GateError, Result};
pub use policy::{resolve, Disposition, PolicyLabel, PolicySummary, PolicyTable};
pub use request::{decode, Build, BuildRequest, Repo};
pub use signature::{
    digest_header, http_date, Algorithm, RequestHead, Signature, SignedRequest, Signer, Verifier,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
