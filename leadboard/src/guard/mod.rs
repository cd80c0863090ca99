//! Interception of navigation that would drop unsaved placement changes.

mod navigation;

pub use navigation::{
    BlockReason, GuardChoice, NavigationGuard, NavigationKind, NavigationOutcome, PromptInfo,
};
