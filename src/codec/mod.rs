//! Codec module - payload serialization and decoding.
//!
//! - [`JsonCodec`] - serde_json decoding returning the crate error type
//! - [`PayloadDecoder`] - seam for turning raw payload bytes into an
//!   [`EventPayload`](crate::EventPayload)
//! - [`JsonPayloadDecoder`] - default decoder for the standard shapes
//!
//! # Design
//!
//! `JsonCodec` is a marker struct with static methods. The payload decoder
//! is a trait object so applications can swap in their own shapes without
//! making the client generic.

mod json;

pub use json::{JsonCodec, JsonPayloadDecoder, PayloadDecoder};
