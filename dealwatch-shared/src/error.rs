/// Common error types
///
/// `StoreError` is the persistence layer's vocabulary. `CommandError` is the
/// command layer's: its `Display` strings are the exact chat-readable
/// replies sent back to the user, so they are written for people, not logs.
use thiserror::Error;

/// Persistence failure
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced entity does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness or immutability rule was violated
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Command handling failure, rendered verbatim as the chat reply
#[derive(Debug, Error)]
pub enum CommandError {
    /// Verb not recognized; carries the nearest known verb
    #[error("Unknown command '{input}'. Did you mean {suggestion}?")]
    UnknownCommand { input: String, suggestion: String },

    /// Recognized verb, malformed arguments
    #[error("That doesn't look right: {0}")]
    InvalidArguments(String),

    /// A scoped command arrived with no active room
    #[error("You're not in a room yet. ROOMCREATE <name> or ROOMJOIN <code> to start.")]
    NoActiveRoom,

    /// The user is not a member of the room in question
    #[error("You're not a member of that room.")]
    NotAMember,

    /// Joining a room the user already belongs to
    #[error("You're already in that room.")]
    AlreadyMember,

    /// The actor's role does not allow the operation
    #[error("You don't have permission to do that.")]
    PermissionDenied,

    /// No room carries the given invite code
    #[error("That invite code doesn't match any room.")]
    InvalidInviteCode,

    /// No room matches the given reference
    #[error("No room called '{0}' among yours.")]
    RoomNotFound(String),

    /// No item matches the given reference
    #[error("No item '{0}' in this room. ALL lists what's being watched.")]
    ItemNotFound(String),

    /// No member matches the given reference
    #[error("No member '{0}' in this room. ROOMMEMBERS lists everyone.")]
    MemberNotFound(String),

    /// Internal failure; details stay in the logs
    #[error("Something went wrong on our side. Please try again.")]
    Internal(#[from] StoreError),
}
