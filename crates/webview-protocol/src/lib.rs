//! Shared message types for host/webview notebook output rendering.
//!
//! This crate defines the JSON protocol spoken between a host editor and the
//! sandboxed webview that renders notebook cell outputs. Every message is a
//! single JSON object discriminated by a `type` field.
//!
//! # Features
//!
//! - Base64 encoding/decoding for raw output payloads
//! - Inbound (host → webview) and outbound (webview → host) message enums
//! - Renderer metadata and output descriptors shared with the host
//! - TypeScript type exports via `ts-rs` for the host frontend

mod base64;
mod messages;

pub use crate::base64::{deserialize_payload, serialize_payload};
pub use messages::{
    DecodeError, HostMessage, OutputDescriptor, OutputItemDescriptor, RendererEntrypoint,
    RendererMetadata, WebviewMessage,
};
