//! Fixed-width record codec for odfce.
//!
//! - [`Schema`] - Static field layout with a declared width
//! - [`Codec`] - Little-endian pack/unpack and frame reading for one schema
//! - [`layout`] - The layouts of every odfce binary format
//! - [`Cipher`] / [`xor`] - Cycling-key XOR applied to packed buffers

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/odfce/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cipher;
mod codec;
pub mod layout;
mod schema;

pub use cipher::{Cipher, xor};
pub use codec::{Codec, Value, float_to_decimal};
pub use schema::{Field, FieldKind, SUPPORTED_PADDING, Schema};
