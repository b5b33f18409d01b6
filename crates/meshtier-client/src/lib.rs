//! meshtier-client: validation, editing and status decoding for meshtier
//! node profiles.

pub mod aggregate;
pub mod cidr_editor;
pub mod decode;
pub mod edit;
pub mod profile_file;
pub mod validate;
