//! Wire-level protocol: envelope parsing, header scanning and the RFC 6455
//! opening handshake.

pub mod cursor;
pub mod envelope;
pub mod handshake;
pub mod index;
pub mod scan;
pub mod views;

pub use cursor::{ByteCursor, avoid_starvation, locate_double_eol, suffix_match};
pub use envelope::{Envelope, InterestSet, ParseStatus, dequote, parse_query};
pub use handshake::{
    Rejection, UpgradeValidator, ValidationStep, WS_GUID, build_request, derive_accept,
    handshake_interest, verify_response,
};
pub use index::{HeaderIndex, index_headers};
pub use scan::{parse_cookies, scan_all};
pub use views::{HTTP_1_1, Request, Response, StatusCode};
