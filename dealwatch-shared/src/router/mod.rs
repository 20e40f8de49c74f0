/// Command router
///
/// The single entry point for inbound chat messages. Resolves (or creates)
/// the sender from their channel identity, parses the message, dispatches
/// to the directory, registry, or summary generator, and renders the reply
/// as plain chat text. Bad input of any shape produces a readable reply,
/// never a panic or an opaque error.
///
/// Scoped commands (ADD, MY, ALL, FAMILY, REMOVE, MUTE, ORDERSUMMARY)
/// auto-provision a personal general-shopping room when the sender has no
/// active room, so the first message a new user sends can already be an
/// ADD.

mod parse;

pub use parse::{parse, Command, VERBS};

use std::sync::Arc;

use chrono::Utc;

use crate::directory::RoomDirectory;
use crate::error::CommandError;
use crate::models::{Room, RoomKind, User, WatchedItem};
use crate::registry::{ListScope, WatchRegistry};
use crate::summary::{self, SummaryFilter, SummaryGenerator};

const HELP_TEXT: &str = "\
Here's what I understand:
ROOMCREATE <name> | <type?>   create a room (type: general shopping / food)
ROOMJOIN <code>               join a room by invite code
ROOMS                         list your rooms
ROOMSWITCH <room>             change your active room
ROOMCODE                      show the active room's invite code
ROOMMEMBERS                   list the active room's members
ROOMLEAVE                     leave the active room
ROOMREMOVE <member>           remove a member (owner/admin)
ROOMPROMOTE <member>          promote a member to admin (owner)
NAME <your name>              set your display name
ADD <link> | <nick> | <who?> | <qty?>   watch a product
MY / ALL / FAMILY <member?>   list watched items
REMOVE <item>                 stop watching an item
REMOVEALL                     stop watching everything you added here
MUTE <item>                   toggle price alerts for an item
ORDERSUMMARY [TODAY]          the room's order summary";

/// Chat command router service
pub struct CommandRouter {
    directory: Arc<RoomDirectory>,
    registry: Arc<WatchRegistry>,
    summary: Arc<SummaryGenerator>,
}

impl CommandRouter {
    /// Creates a router over the given services
    pub fn new(
        directory: Arc<RoomDirectory>,
        registry: Arc<WatchRegistry>,
        summary: Arc<SummaryGenerator>,
    ) -> Self {
        CommandRouter {
            directory,
            registry,
            summary,
        }
    }

    /// Handles one inbound message and returns the reply text
    ///
    /// This never fails: command errors render as their chat-readable
    /// `Display` strings, internal errors are logged and render as a
    /// generic apology.
    pub async fn handle(&self, sender: &str, text: &str) -> String {
        match self.dispatch(sender, text).await {
            Ok(reply) => reply,
            Err(e) => {
                if let CommandError::Internal(source) = &e {
                    tracing::error!(sender = %sender, error = %source, "Command failed internally");
                } else {
                    tracing::debug!(sender = %sender, reply = %e, "Command rejected");
                }
                e.to_string()
            }
        }
    }

    async fn dispatch(&self, sender: &str, text: &str) -> Result<String, CommandError> {
        let command = parse(text)?;
        let user = self.directory.resolve_user(sender).await?;
        tracing::debug!(sender = %sender, user_id = %user.id, command = ?command, "Dispatching command");

        match command {
            Command::RoomCreate { name, kind } => {
                let kind = kind.unwrap_or(RoomKind::GeneralShopping);
                let room = self.directory.create_room(&name, kind, user.id).await?;
                Ok(format!(
                    "Created '{}' ({}). Invite code: {}. It's now your active room.",
                    room.name,
                    room.kind.as_str(),
                    room.invite_code
                ))
            }
            Command::RoomJoin { code } => {
                let room = self.directory.join_room(&code, user.id).await?;
                Ok(format!(
                    "Joined '{}'. It's now your active room.",
                    room.name
                ))
            }
            Command::Rooms => {
                let rooms = self.directory.list_rooms(user.id).await?;
                if rooms.is_empty() {
                    return Ok(
                        "You're not in any rooms yet. ROOMCREATE <name> or ROOMJOIN <code> to start."
                            .to_string(),
                    );
                }
                let mut out = String::from("Your rooms:");
                for (i, room) in rooms.iter().enumerate() {
                    let active = if user.active_room_id == Some(room.id) {
                        " (active)"
                    } else {
                        ""
                    };
                    out.push_str(&format!(
                        "\n{}. {} ({}) code {}{}",
                        i + 1,
                        room.name,
                        room.kind.as_str(),
                        room.invite_code,
                        active
                    ));
                }
                Ok(out)
            }
            Command::RoomSwitch { room } => {
                let room = self.directory.switch_active_room(user.id, &room).await?;
                Ok(format!("Switched to '{}'.", room.name))
            }
            Command::RoomCode => {
                let room = self.require_active(&user).await?;
                Ok(format!(
                    "Invite code for '{}': {}",
                    room.name, room.invite_code
                ))
            }
            Command::RoomMembers => {
                let room = self.require_active(&user).await?;
                let members = self.directory.room_members(room.id).await?;
                let mut out = format!("Members of '{}':", room.name);
                for (i, (membership, member)) in members.iter().enumerate() {
                    out.push_str(&format!(
                        "\n{}. {} ({})",
                        i + 1,
                        member.label(),
                        membership.role.as_str()
                    ));
                }
                Ok(out)
            }
            Command::RoomLeave => {
                let room = self.require_active(&user).await?;
                match self.directory.leave_room(user.id).await {
                    Ok(left) => Ok(format!("You left '{}'.", left.name)),
                    Err(CommandError::PermissionDenied) => Ok(format!(
                        "You own '{}'; owners can't leave their room.",
                        room.name
                    )),
                    Err(e) => Err(e),
                }
            }
            Command::RoomRemove { member } => {
                let room = self.require_active(&user).await?;
                let removed = self
                    .directory
                    .remove_member(user.id, room.id, &member)
                    .await?;
                Ok(format!(
                    "Removed {} from '{}'.",
                    removed.label(),
                    room.name
                ))
            }
            Command::RoomPromote { member } => {
                let room = self.require_active(&user).await?;
                let promoted = self
                    .directory
                    .promote_member(user.id, room.id, &member)
                    .await?;
                Ok(format!(
                    "{} is now an admin of '{}'.",
                    promoted.label(),
                    room.name
                ))
            }
            Command::Name { name } => {
                self.directory.set_display_name(user.id, &name).await?;
                Ok(format!("Got it. You're {name}."))
            }
            Command::Add {
                link,
                nickname,
                assigned,
                quantity,
            } => {
                let room = self.provision_active(&user).await?;
                let outcome = self
                    .registry
                    .add_item(&user, room.id, &link, &nickname, assigned, quantity)
                    .await?;
                let item = outcome.item;
                if outcome.merged {
                    Ok(format!(
                        "'{}' was already watched in '{}'; quantity is now {}.",
                        item.nickname, room.name, item.quantity
                    ))
                } else if item.baseline_price > 0.0 {
                    Ok(format!(
                        "Watching {} x{} at {} in '{}'.",
                        item.nickname,
                        item.quantity,
                        summary::money(item.baseline_price),
                        room.name
                    ))
                } else {
                    Ok(format!(
                        "Watching {} x{} in '{}'. First price check is pending.",
                        item.nickname, item.quantity, room.name
                    ))
                }
            }
            Command::My => {
                let room = self.provision_active(&user).await?;
                let items = self
                    .registry
                    .list_items(room.id, ListScope::Mine(user.id))
                    .await?;
                Ok(render_items(&room, &items, "You haven't added anything"))
            }
            Command::All => {
                let room = self.provision_active(&user).await?;
                let items = self.registry.list_items(room.id, ListScope::All).await?;
                Ok(render_items(&room, &items, "Nothing is being watched"))
            }
            Command::Family { member } => {
                let room = self.provision_active(&user).await?;
                let scope = match member {
                    Some(name) => ListScope::ByMember(name),
                    None => ListScope::All,
                };
                let items = self.registry.list_items(room.id, scope).await?;
                Ok(render_items(&room, &items, "Nothing is being watched"))
            }
            Command::Remove { item } => {
                let room = self.provision_active(&user).await?;
                let removed = self.registry.remove_item(user.id, room.id, &item).await?;
                Ok(format!("Stopped watching {}.", removed.nickname))
            }
            Command::RemoveAll => {
                let room = self.provision_active(&user).await?;
                let removed = self.registry.remove_all(user.id, room.id).await?;
                match removed {
                    0 => Ok(format!("You weren't watching anything in '{}'.", room.name)),
                    1 => Ok(format!("Stopped watching your 1 item in '{}'.", room.name)),
                    n => Ok(format!("Stopped watching your {n} items in '{}'.", room.name)),
                }
            }
            Command::Mute { item } => {
                let room = self.provision_active(&user).await?;
                let toggled = self.registry.mute_item(user.id, room.id, &item).await?;
                if toggled.muted {
                    Ok(format!("Alerts muted for {}.", toggled.nickname))
                } else {
                    Ok(format!("Alerts back on for {}.", toggled.nickname))
                }
            }
            Command::OrderSummary { today } => {
                let room = self.provision_active(&user).await?;
                let filter = if today {
                    SummaryFilter::Today(Utc::now())
                } else {
                    SummaryFilter::Everything
                };
                self.summary.render(room.id, filter).await
            }
            Command::Help => Ok(HELP_TEXT.to_string()),
        }
    }

    /// The active room, or `NoActiveRoom` for room-lifecycle commands
    async fn require_active(&self, user: &User) -> Result<Room, CommandError> {
        self.directory
            .active_room(user)
            .await?
            .ok_or(CommandError::NoActiveRoom)
    }

    /// The active room, auto-provisioning a personal one for scoped commands
    async fn provision_active(&self, user: &User) -> Result<Room, CommandError> {
        if let Some(room) = self.directory.active_room(user).await? {
            return Ok(room);
        }
        let name = format!("{}'s list", user.label());
        let room = self
            .directory
            .create_room(&name, RoomKind::GeneralShopping, user.id)
            .await?;
        tracing::info!(user_id = %user.id, room_id = %room.id, "Auto-provisioned personal room");
        Ok(room)
    }
}

fn render_items(room: &Room, items: &[WatchedItem], empty_verb: &str) -> String {
    if items.is_empty() {
        return format!("{} in '{}' yet.", empty_verb, room.name);
    }
    let mut out = format!("Watched in '{}':", room.name);
    for (i, item) in items.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. {} x{}",
            i + 1,
            item.nickname,
            item.quantity
        ));
        if item.last_price > 0.0 {
            out.push_str(&format!(" at {}", summary::money(item.last_price)));
        }
        if let Some(assigned) = &item.assigned_to {
            out.push_str(&format!(" for {assigned}"));
        }
        if item.muted {
            out.push_str(" [muted]");
        }
        if item.poll_state == crate::models::PollState::Stale {
            out.push_str(" [price may be out of date]");
        }
    }
    out
}
