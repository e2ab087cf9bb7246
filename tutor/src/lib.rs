//! Tutor: client-side core for the Lisan Arabic tutor.
//!
//! DESIGN
//! ======
//! Everything a chat front end needs between "the learner typed something"
//! and "the backend answered": learner preferences, a stable per-user
//! identity, the conversation state machine, the free-tier quota gate, and
//! the HTTP gateway to the backend. Shared record types (`Message`,
//! `Conversation`, `Subscription`, `MaterialItem`) live here too so the
//! server and the CLI agree on one wire shape.
//!
//! Storage and the remote gateway are injected behind traits so tests run
//! against in-memory fakes.

pub mod api;
pub mod conversation;
pub mod gateway;
pub mod identity;
pub mod materials;
pub mod message;
pub mod prefs;
pub mod quota;
pub mod storage;
pub mod subscription;
pub mod welcome;

pub use conversation::{
    ConversationContext, ConversationManager, Notice, NoticeAction, NoticeLevel, Phase, ResumeSource, SendOutcome,
};
pub use gateway::{AskGateway, AskReply, AskRequest, AskResponse, FailureKind, GatewayError, HttpAskGateway};
pub use identity::{GUEST_IDENTITY, resolve_identity};
pub use message::{Conversation, Message, Sender};
pub use prefs::{Gender, LanguageMode, PreferenceStore, Preferences, ProficiencyLevel, Week};
pub use quota::{MAX_MESSAGES, QuotaState, month_key};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
