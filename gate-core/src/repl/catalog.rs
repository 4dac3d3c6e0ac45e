//! Static command catalog shared by the parser, completion and `help`.
//!
//! Each command lists its parameters in order; the parser and completion
//! engine walk the same table so keywords and argument layouts stay in sync.

use crate::dialing::DialType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Dial,
    Encode,
    Lock,
    Stop,
    Reset,
    Close,
    Send,
    Advance,
    Status,
    Help,
}

/// Positional parameter of a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Param {
    /// Gate name.
    Gate,
    /// Gate name that may be omitted.
    OptionalGate,
    /// Dial mode keyword; defaults to fast when absent.
    Mode,
    /// Full address such as `26-6-14-31-11-29-0`.
    Address,
    /// Single glyph index.
    Symbol,
    /// Object identifier.
    Object,
    /// Duration literal such as `250ms` or `2s`.
    Duration,
    /// Command name to describe.
    Topic,
}

impl Param {
    /// Returns `true` when the parameter may be left out.
    #[must_use]
    pub const fn is_optional(self) -> bool {
        matches!(self, Param::OptionalGate | Param::Mode | Param::Topic)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Param::Gate | Param::OptionalGate => "gate name",
            Param::Mode => "dial mode",
            Param::Address => "address",
            Param::Symbol => "symbol",
            Param::Object => "object id",
            Param::Duration => "duration",
            Param::Topic => "command name",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub params: &'static [Param],
    pub usage: &'static str,
    pub summary: &'static str,
}

/// Dial mode keyword and the strategy it selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeSpec {
    pub keyword: &'static str,
    pub kind: DialType,
}

const MODES: [ModeSpec; 3] = [
    ModeSpec {
        keyword: "fast",
        kind: DialType::Fast,
    },
    ModeSpec {
        keyword: "slow",
        kind: DialType::Slow,
    },
    ModeSpec {
        keyword: "instant",
        kind: DialType::Instant,
    },
];

const MODE_KEYWORDS: [&str; 3] = ["fast", "slow", "instant"];

const COMMANDS: [CommandSpec; 10] = [
    CommandSpec {
        name: "dial",
        tag: CommandTag::Dial,
        params: &[Param::Gate, Param::Mode, Param::Address],
        usage: "dial <gate> [fast|slow|instant] <address>",
        summary: "start an outgoing dial",
    },
    CommandSpec {
        name: "encode",
        tag: CommandTag::Encode,
        params: &[Param::Gate, Param::Symbol],
        usage: "encode <gate> <symbol>",
        summary: "encode one symbol by hand",
    },
    CommandSpec {
        name: "lock",
        tag: CommandTag::Lock,
        params: &[Param::Gate, Param::Symbol],
        usage: "lock <gate> <symbol>",
        summary: "lock the final symbol of a manual dial",
    },
    CommandSpec {
        name: "stop",
        tag: CommandTag::Stop,
        params: &[Param::Gate],
        usage: "stop <gate>",
        summary: "abort the dial in progress",
    },
    CommandSpec {
        name: "reset",
        tag: CommandTag::Reset,
        params: &[Param::Gate],
        usage: "reset <gate>",
        summary: "force the gate back to idle",
    },
    CommandSpec {
        name: "close",
        tag: CommandTag::Close,
        params: &[Param::Gate],
        usage: "close <gate>",
        summary: "shut down the open link",
    },
    CommandSpec {
        name: "send",
        tag: CommandTag::Send,
        params: &[Param::Gate, Param::Object],
        usage: "send <gate> <object-id>",
        summary: "pass an object through the open link",
    },
    CommandSpec {
        name: "advance",
        tag: CommandTag::Advance,
        params: &[Param::Duration],
        usage: "advance <duration>",
        summary: "run the simulation forward",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        params: &[Param::OptionalGate],
        usage: "status [gate]",
        summary: "show gate state",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        params: &[Param::Topic],
        usage: "help [command]",
        summary: "describe commands",
    },
];

const COMMAND_NAMES: [&str; 10] = [
    "dial", "encode", "lock", "stop", "reset", "close", "send", "advance", "status", "help",
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Command names in catalog order.
#[must_use]
pub const fn command_names() -> &'static [&'static str] {
    &COMMAND_NAMES
}

/// Looks up a command by its tag.
#[must_use]
pub fn command(tag: CommandTag) -> &'static CommandSpec {
    match tag {
        CommandTag::Dial => &COMMANDS[0],
        CommandTag::Encode => &COMMANDS[1],
        CommandTag::Lock => &COMMANDS[2],
        CommandTag::Stop => &COMMANDS[3],
        CommandTag::Reset => &COMMANDS[4],
        CommandTag::Close => &COMMANDS[5],
        CommandTag::Send => &COMMANDS[6],
        CommandTag::Advance => &COMMANDS[7],
        CommandTag::Status => &COMMANDS[8],
        CommandTag::Help => &COMMANDS[9],
    }
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

/// Dial modes accepted by `dial`.
#[must_use]
pub const fn modes() -> &'static [ModeSpec] {
    &MODES
}

#[must_use]
pub const fn mode_keywords() -> &'static [&'static str] {
    &MODE_KEYWORDS
}

/// Finds a dial mode by keyword (case insensitive).
#[must_use]
pub fn find_mode(keyword: &str) -> Option<DialType> {
    MODES
        .iter()
        .find(|mode| mode.keyword.eq_ignore_ascii_case(keyword))
        .map(|mode| mode.kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_tag_matches_catalog_order() {
        for spec in commands() {
            assert_eq!(command(spec.tag).name, spec.name);
        }
        assert_eq!(command_names().len(), commands().len());
        for (name, spec) in command_names().iter().zip(commands()) {
            assert_eq!(*name, spec.name);
        }
    }

    #[test]
    fn find_ignores_case() {
        let spec = find("DiAl").expect("dial should be in the catalog");
        assert_eq!(spec.tag, CommandTag::Dial);
        assert!(find("reboot").is_none());
        assert_eq!(find_mode("SLOW"), Some(DialType::Slow));
        assert_eq!(find_mode("manual"), None);
    }
}
