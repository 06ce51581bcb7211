//! Contract surface of the hosted messaging collaborator.
//!
//! Everything behind these traits belongs to the messaging service:
//! transport, persistence, delivery, and the chat widget itself. The app
//! only ever drives the surface defined here, so the embedded demo provider
//! in [`local`] and a real hosted service are interchangeable.

pub mod local;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use ratatui::layout::Rect;
use ratatui::Frame;

use crate::identity::{Role, UserIdentity};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A user record as the collaborator sees it.
///
/// Constructed only through [`ChatProvider::user`], which is the analog of
/// registering the identity with the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserHandle {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub avatar_url: String,
    pub role: Role,
}

impl UserHandle {
    pub(crate) fn from_identity(identity: &UserIdentity) -> Self {
        Self {
            id: identity.id.clone(),
            display_name: identity.display_name.clone(),
            email: identity.email.clone(),
            avatar_url: identity.avatar_url.clone(),
            role: identity.role,
        }
    }
}

/// Deterministic identifier for a 1:1 conversation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token for a conversation resolved through the collaborator, obtained from
/// [`ChatSession::get_or_create_conversation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHandle {
    id: ConversationId,
}

impl ConversationHandle {
    pub(crate) fn new(id: ConversationId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }
}

/// Symmetric 1:1 conversation id: the unordered pair of user ids joined in
/// lexicographic order, so both sides derive the same id no matter who asks.
pub fn one_on_one_id(a: &UserHandle, b: &UserHandle) -> ConversationId {
    let (lo, hi) = if a.id <= b.id {
        (&a.id, &b.id)
    } else {
        (&b.id, &a.id)
    };
    ConversationId(format!("{lo}__{hi}"))
}

/// Entry point to the messaging service.
pub trait ChatProvider: Send + Sync {
    /// One-shot readiness signal. The future resolves once the service has
    /// finished bootstrapping; every await after that returns immediately.
    fn ready(&self) -> BoxFuture<'static, ()>;

    /// Blesses an identity record into a collaborator user handle.
    fn user(&self, identity: &UserIdentity) -> UserHandle;

    /// Opens an authenticated session for the local user. The caller owns
    /// the session and must release it with [`ChatSession::destroy`].
    fn session(&self, app_key: &str, me: UserHandle) -> Box<dyn ChatSession>;

    /// Deterministic conversation id for a 1:1 pair.
    fn one_on_one_id(&self, a: &UserHandle, b: &UserHandle) -> ConversationId {
        one_on_one_id(a, b)
    }
}

/// An active connection to the service, bound to one local user.
pub trait ChatSession: Send {
    /// Fetches the conversation with this id, creating it on first use.
    /// Safe to repeat; every call yields a handle to the same conversation.
    fn get_or_create_conversation(&mut self, id: &ConversationId) -> ConversationHandle;

    /// Registers a participant on the conversation. Re-registering an
    /// existing participant is a no-op on the service side.
    fn set_participant(&mut self, conversation: &ConversationHandle, user: &UserHandle);

    /// Creates a chat surface backed by this session.
    fn create_chatbox(&mut self) -> Box<dyn ChatSurface>;

    /// Releases the connection. The session must not be used afterwards.
    fn destroy(&mut self);
}

/// A mountable chat widget supplied by the collaborator.
///
/// The app decides where it lives: after [`mount`](ChatSurface::mount) it
/// hands the surface a screen region every frame and the surface draws
/// whatever the service wants shown there.
pub trait ChatSurface: Send {
    /// Points the surface at a conversation.
    fn select(&mut self, conversation: &ConversationHandle);

    /// Marks the surface as attached to the UI.
    fn mount(&mut self);

    fn is_mounted(&self) -> bool;

    /// Draws the surface into `area`. Called once per frame while mounted.
    fn render(&mut self, frame: &mut Frame<'_>, area: Rect);
}
