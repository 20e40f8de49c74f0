/// Chat command parsing
///
/// Grammar: `VERB arg | arg | arg`. The verb is the first whitespace token,
/// case-insensitive; the remainder splits on `|` with every part trimmed.
/// Legacy verbs from earlier releases are folded in through the alias table
/// before dispatch. An unrecognized verb produces a suggestion by edit
/// distance over the known verbs.
use crate::error::CommandError;
use crate::models::RoomKind;

/// A parsed chat command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RoomCreate { name: String, kind: Option<RoomKind> },
    RoomJoin { code: String },
    Rooms,
    RoomSwitch { room: String },
    RoomCode,
    RoomMembers,
    RoomLeave,
    RoomRemove { member: String },
    RoomPromote { member: String },
    Name { name: String },
    Add { link: String, nickname: String, assigned: Option<String>, quantity: u32 },
    My,
    All,
    Family { member: Option<String> },
    Remove { item: String },
    RemoveAll,
    Mute { item: String },
    OrderSummary { today: bool },
    Help,
}

/// Canonical verbs, used for the help block and typo suggestions
pub const VERBS: &[&str] = &[
    "ROOMCREATE",
    "ROOMJOIN",
    "ROOMS",
    "ROOMSWITCH",
    "ROOMCODE",
    "ROOMMEMBERS",
    "ROOMLEAVE",
    "ROOMREMOVE",
    "ROOMPROMOTE",
    "NAME",
    "ADD",
    "MY",
    "ALL",
    "FAMILY",
    "REMOVE",
    "REMOVEALL",
    "MUTE",
    "ORDERSUMMARY",
    "HELP",
];

/// Legacy verb spellings accepted for compatibility
const ALIASES: &[(&str, &str)] = &[
    ("MYALL", "ALL"),
    ("MYPERSONAL", "MY"),
    ("REMOVEPERSON", "ROOMREMOVE"),
    ("REMOVEBY", "ROOMREMOVE"),
    ("SUMMARY", "ORDERSUMMARY"),
    ("COMMANDS", "HELP"),
    ("START", "HELP"),
];

/// Parses an inbound message into a command
pub fn parse(text: &str) -> Result<Command, CommandError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Command::Help);
    }

    let (verb_raw, payload) = match text.split_once(char::is_whitespace) {
        Some((v, rest)) => (v, rest.trim()),
        None => (text, ""),
    };
    let mut verb = verb_raw.to_ascii_uppercase();
    if let Some((_, canonical)) = ALIASES.iter().find(|(a, _)| *a == verb) {
        verb = (*canonical).to_string();
    }

    let args: Vec<&str> = if payload.is_empty() {
        Vec::new()
    } else {
        payload.split('|').map(str::trim).collect()
    };

    match verb.as_str() {
        "ROOMCREATE" => {
            let name = require(&args, 0, "ROOMCREATE <name> | <type?>")?;
            let kind = match args.get(1).filter(|k| !k.is_empty()) {
                Some(raw) => Some(RoomKind::parse(raw).ok_or_else(|| {
                    CommandError::InvalidArguments(format!(
                        "room type '{raw}' — use 'general shopping' or 'food'"
                    ))
                })?),
                None => None,
            };
            Ok(Command::RoomCreate {
                name: name.to_string(),
                kind,
            })
        }
        "ROOMJOIN" => Ok(Command::RoomJoin {
            code: require(&args, 0, "ROOMJOIN <invite code>")?.to_string(),
        }),
        "ROOMS" => Ok(Command::Rooms),
        "ROOMSWITCH" => Ok(Command::RoomSwitch {
            room: require(&args, 0, "ROOMSWITCH <room name or code>")?.to_string(),
        }),
        "ROOMCODE" => Ok(Command::RoomCode),
        "ROOMMEMBERS" => Ok(Command::RoomMembers),
        "ROOMLEAVE" => Ok(Command::RoomLeave),
        "ROOMREMOVE" => Ok(Command::RoomRemove {
            member: require(&args, 0, "ROOMREMOVE <member>")?.to_string(),
        }),
        "ROOMPROMOTE" => Ok(Command::RoomPromote {
            member: require(&args, 0, "ROOMPROMOTE <member>")?.to_string(),
        }),
        "NAME" => Ok(Command::Name {
            name: require(&args, 0, "NAME <your name>")?.to_string(),
        }),
        "ADD" => parse_add(&args),
        "MY" => Ok(Command::My),
        "ALL" => Ok(Command::All),
        "FAMILY" => Ok(Command::Family {
            member: args.first().filter(|m| !m.is_empty()).map(|m| m.to_string()),
        }),
        "REMOVE" => Ok(Command::Remove {
            item: require(&args, 0, "REMOVE <item>")?.to_string(),
        }),
        "REMOVEALL" => Ok(Command::RemoveAll),
        "MUTE" => Ok(Command::Mute {
            item: require(&args, 0, "MUTE <item>")?.to_string(),
        }),
        "ORDERSUMMARY" => Ok(Command::OrderSummary {
            today: args
                .first()
                .is_some_and(|a| a.eq_ignore_ascii_case("today")),
        }),
        "HELP" => Ok(Command::Help),
        unknown => Err(CommandError::UnknownCommand {
            input: unknown.to_string(),
            suggestion: nearest_verb(unknown).to_string(),
        }),
    }
}

/// `ADD <link> | <nickname> | <assigned?> | <qty?>`
///
/// With three parts the last one is ambiguous; a purely numeric part is
/// taken as the quantity, anything else as the assigned member.
fn parse_add(args: &[&str]) -> Result<Command, CommandError> {
    const USAGE: &str = "ADD <link> | <nickname> | <assigned?> | <qty?>";
    let link = require(args, 0, USAGE)?;
    let nickname = require(args, 1, USAGE)?;

    let (assigned, quantity) = match (args.get(2).copied(), args.get(3).copied()) {
        (None, _) => (None, 1),
        (Some(third), None) => {
            if third.chars().all(|c| c.is_ascii_digit()) {
                (None, parse_qty(third)?)
            } else {
                (Some(third.to_string()), 1)
            }
        }
        (Some(third), Some(fourth)) => (Some(third.to_string()), parse_qty(fourth)?),
    };

    Ok(Command::Add {
        link: link.to_string(),
        nickname: nickname.to_string(),
        assigned,
        quantity,
    })
}

fn parse_qty(raw: &str) -> Result<u32, CommandError> {
    let qty: u32 = raw
        .parse()
        .map_err(|_| CommandError::InvalidArguments(format!("'{raw}' is not a quantity")))?;
    if qty == 0 {
        return Err(CommandError::InvalidArguments(
            "quantity must be at least 1".to_string(),
        ));
    }
    Ok(qty)
}

fn require<'a>(args: &[&'a str], index: usize, usage: &str) -> Result<&'a str, CommandError> {
    args.get(index)
        .copied()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| CommandError::InvalidArguments(format!("usage: {usage}")))
}

/// Known verb closest to the input by edit distance
///
/// Alias spellings participate in the search but the suggestion is always
/// the canonical verb.
pub fn nearest_verb(input: &str) -> &'static str {
    let upper = input.to_ascii_uppercase();
    VERBS
        .iter()
        .map(|v| (*v, *v))
        .chain(ALIASES.iter().copied())
        .min_by_key(|(spelling, _)| levenshtein(&upper, spelling))
        .map(|(_, canonical)| canonical)
        .unwrap_or("HELP")
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut prev = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { prev } else { prev + 1 };
            prev = row[j + 1];
            row[j + 1] = cost.min(row[j] + 1).min(prev + 1);
        }
    }
    row[b.len()]
}
