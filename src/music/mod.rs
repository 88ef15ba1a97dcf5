// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Musical representation.
//!
//! Notes, the event alphabet fed to the network, and the codec between them.

pub mod codec;
pub mod event;
pub mod metadata;

pub use codec::{decode, encode};
pub use event::{Event, Note, DIVIDER_KEY};
pub use metadata::{metadata_tsv, readable_duration, readable_pitch};
