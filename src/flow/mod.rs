//! The intake flow core: step catalog, branch resolver, session store,
//! session engine, and submission finalizer.

pub mod branch;
pub mod engine;
pub mod event;
pub mod session;
pub mod step;
pub mod submission;

pub use branch::BranchTable;
pub use engine::SessionEngine;
pub use event::{AttachmentRef, Event, Outcome, RejectReason};
pub use session::{Session, SessionStore};
pub use step::{Catalog, NextStep, Step, StepId};
pub use submission::{Finalizer, Submission};
