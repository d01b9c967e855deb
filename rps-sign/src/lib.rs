//! Signing pipeline for São Paulo NFS-e RPS submissions.
//!
//! Everything in here is synchronous and does no I/O: key material comes in
//! as bytes, XML goes in and out as strings.
pub mod c14n;
pub mod crypto;
pub mod error;
pub mod format;
pub mod response;
pub mod rps;
pub mod signature;

pub use crate::{
    crypto::{sign, sign_record, KeyMaterial},
    error::{Error, FormatError, ParseError, SigningError},
    response::{parse as parse_response, ResponseTree, ResponseValue},
    rps::{build as build_signing_string, InvoiceRecord, SigningString, Tomador},
    signature::{sign_enveloped, verify_enveloped},
};
