//! Hierarchical configuration data in a single relocatable buffer.
//!
//! A [`ConfigData`] stores booleans, numbers, strings, arrays and objects
//! in one contiguous, pointer-free byte image, addressed by 32-bit [`Loc`]
//! handles. Strings are interned through an embedded
//! [`string_table`], and [`json::parse`] fills a store from JSON or from
//! several relaxed dialects (comments, bare keys, optional commas, `=`,
//! triple-quoted strings).
//!
//! The design target is load-once, read-mostly data: the image can be
//! written to disk or copied bytewise and reopened without fixups, handles
//! stay valid across buffer growth, and reads never allocate.
//!
//! ```
//! use confdata::{ConfigData, json};
//!
//! let mut cd = ConfigData::new();
//! json::parse(r#"{"name": "Amy", "scores": [10, 20]}"#, &mut cd).unwrap();
//!
//! let root = cd.root();
//! assert_eq!(cd.to_string(cd.object_lookup(root, "name")), "Amy");
//! let scores = cd.object_lookup(root, "scores");
//! assert_eq!(cd.array_size(scores), 2);
//! ```
//!
//! Not covered, by design: thread-safe mutation, schema validation,
//! writing back to JSON text, and freeing individual values (the store is
//! append-only for its whole lifetime).

pub mod config_data;
pub mod error;
pub(crate) mod hash;
pub mod json;
pub mod loc;
pub mod string_table;

pub use crate::config_data::ConfigData;
pub use crate::error::{ParseError, ParseErrorKind, ParseResult};
pub use crate::json::{Settings, parse, parse_with_settings};
pub use crate::loc::{Kind, Loc};
