use std::fmt;

/// The part a demo participant plays in the consultation room.
///
/// The keeper owns the room and waits for consultations; the creator is the
/// one who walks in and starts one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Keeper,
    Creator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Keeper => "keeper",
            Role::Creator => "creator",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Keeper => "Keeper",
            Role::Creator => "Creator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete participant record, ready to hand to the chat collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub avatar_url: String,
    pub role: Role,
}

/// The local actor plus their fixed counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentities {
    pub me: UserIdentity,
    pub other: UserIdentity,
    /// Window label describing who this instance is acting as.
    pub label: String,
}

fn keeper() -> UserIdentity {
    UserIdentity {
        id: "user1".to_string(),
        display_name: "User 1 (Keeper)".to_string(),
        email: "user1@example.com".to_string(),
        avatar_url: "https://demo.example.com/avatars/keeper.png".to_string(),
        role: Role::Keeper,
    }
}

fn creator() -> UserIdentity {
    UserIdentity {
        id: "user2".to_string(),
        display_name: "User 2 (Creator)".to_string(),
        email: "user2@example.com".to_string(),
        avatar_url: "https://demo.example.com/avatars/creator.png".to_string(),
        role: Role::Creator,
    }
}

/// Maps the `--user` selector to the two demo identities.
///
/// Exactly `"user2"` flips the local actor onto the creator path; any other
/// value, including none at all, silently stays on the keeper path. The two
/// records are total mirrors of each other, so both instances of the demo
/// agree on who is in the conversation.
pub fn resolve(selector: Option<&str>) -> ResolvedIdentities {
    match selector {
        Some("user2") => ResolvedIdentities {
            me: creator(),
            other: keeper(),
            label: "User2 - Creator (joins the consultation room)".to_string(),
        },
        _ => ResolvedIdentities {
            me: keeper(),
            other: creator(),
            label: "User1 - Keeper (creates the consultation room)".to_string(),
        },
    }
}
