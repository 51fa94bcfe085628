//! Community segments: overlap merging and moderation.

mod merge;
mod moderation;

pub use merge::merge;
pub use moderation::{ItemRef, Moderation, ResolveAction, SubmitRequest};
