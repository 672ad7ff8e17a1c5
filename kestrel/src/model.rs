//! The model contract: the kernel's only dependency on user-supplied
//! domain code.
//!
//! Everything about how activities are authored, how attributes are backed,
//! and how they're wired together is a model concern; the kernel only needs
//! to turn a `(activity_type, args)` pair into a runnable [Task] and, for
//! diagnostics, sample a named attribute through a [TaskFrame].

use crate::error::KestrelError;
use crate::event::Value;
use crate::frame::TaskFrame;
use crate::task::{Args, Task};

/// A model: the set of activity types a plan's directives can name, plus
/// whatever attributes it exposes for profile sampling.
pub trait Model: Send {
    /// Builds a fresh, not-yet-stepped [Task] for one invocation of
    /// `activity_type` with `args`. Returns
    /// [`KestrelError::UnknownActivity`] if the model has no such activity.
    fn make_task(&self, activity_type: &str, args: &Args) -> Result<Box<dyn Task>, KestrelError>;

    /// The set of activity type names this model can construct tasks for.
    fn activity_types(&self) -> Vec<String>;

    /// The set of attribute names this model exposes for profile sampling.
    /// Models with no such attributes (most kernel-only tests) can leave this
    /// at its default empty list.
    fn attributes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Samples `name` at `frame`'s vantage point, reading through the frame
    /// as any activity would. Only meaningful for names returned by
    /// [`attributes`](Self::attributes).
    fn get_attribute(&self, frame: &mut TaskFrame, name: &str) -> anyhow::Result<Value>;
}
