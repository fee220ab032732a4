//! Message mirroring: origin messages become relay webhook sends, with
//! quote prefixes, mention rewriting, attachment handling, and an
//! `ss/pattern/replacement/` rewrite command for post-hoc edits.

pub mod anchor;
pub mod content;
pub mod rewrite;
pub mod service;

pub use service::{MessageMirror, MirrorOutcome};
