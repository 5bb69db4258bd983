//! Wire format and pure logic for HTTP request batching.
//!
//! # Overview
//! A batch is one HTTP request whose body is a JSON array of sub-requests;
//! the answer is one HTTP response whose body is a JSON array of
//! sub-responses in the same order. This crate holds everything about that
//! exchange that does not need a network or an async runtime: the wire
//! records, the body parser and encoder, the content-negotiation rule, and a
//! host-does-IO client for the batch endpoint.
//!
//! # Design
//! - `RequestSpec` / `ResponseSpec` are the wire records; `HeaderSet` keeps
//!   header order and duplicates.
//! - `BatchError` is shared with the server crate so both sides agree on
//!   fault kinds and their status codes.
//! - `BatchClient` builds `HttpRequest` and parses `HttpResponse`; the caller
//!   executes the round-trip.

pub mod client;
pub mod error;
pub mod headers;
pub mod http;
pub mod negotiate;
pub mod parse;
pub mod types;

pub use client::{BatchClient, DEFAULT_BATCH_PATH};
pub use error::{ApiError, BatchError};
pub use headers::{HeaderPair, HeaderSet};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use negotiate::{declares_json, negotiate_body, strip_hop_by_hop};
pub use parse::{encode_response_list, parse_request_bytes, parse_request_list};
pub use types::{RequestSpec, ResponseBody, ResponseSpec};
