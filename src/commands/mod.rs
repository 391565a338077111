//! Service-bot command registry and execution engine.
//!
//! Commands are independent types implementing [`Command`], registered by
//! service name into a process-wide [`CommandMap`]; each [`ServiceBot`]
//! maps the display names its users type to a [`CommandInfo`] carrying the
//! service name, required permission, and help metadata. Both registrations
//! are revocable, which is what module unload relies on.

mod help;

pub use help::HelpCommand;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, warn};
use wint_proto::{irc_to_lower, TokenStream};

use crate::state::nick::Account;
use crate::state::Construct;

/// Static metadata of one invokable command.
#[derive(Debug, Clone, Default)]
pub struct CommandDef {
    /// One-line description shown in command listings.
    pub desc: String,
    /// Syntax hints, one per accepted form.
    pub syntax: Vec<String>,
    /// Minimum parameters required before `execute` runs.
    pub min_params: usize,
    /// Maximum parameter slots; tokens beyond the last slot are folded into
    /// it, spaces preserved. `None` applies no upper bound.
    pub max_params: Option<usize>,
    /// Allow users with no resolved account.
    pub allow_unregistered: bool,
    /// Require a user to be attached to the invocation.
    pub require_user: bool,
}

impl CommandDef {
    /// Create a definition with the given parameter bounds.
    pub fn new(min_params: usize, max_params: Option<usize>) -> Self {
        Self {
            min_params,
            max_params,
            ..Self::default()
        }
    }

    /// Set the description.
    pub fn desc(mut self, desc: &str) -> Self {
        self.desc = desc.to_string();
        self
    }

    /// Add a syntax hint.
    pub fn syntax(mut self, syntax: &str) -> Self {
        self.syntax.push(syntax.to_string());
        self
    }

    /// Allow unregistered users.
    pub fn allow_unregistered(mut self) -> Self {
        self.allow_unregistered = true;
        self
    }

    /// Require an attached user.
    pub fn require_user(mut self) -> Self {
        self.require_user = true;
        self
    }
}

/// One invokable capability, polymorphic over `execute`.
#[async_trait]
pub trait Command: Send + Sync {
    /// Static metadata for this command.
    fn def(&self) -> &CommandDef;

    /// Run the command. Every declared check has already passed.
    async fn execute(&self, core: &Arc<Construct>, source: &mut CommandSource, params: &[String]);

    /// Produce help for this command (optionally for `subcommand`).
    /// Return false to decline; the caller falls back to a generic reply.
    async fn on_help(
        &self,
        _core: &Arc<Construct>,
        _source: &mut CommandSource,
        _subcommand: &str,
    ) -> bool {
        false
    }

    /// Called when the invocation carried too few parameters.
    async fn on_syntax_error(
        &self,
        _core: &Arc<Construct>,
        source: &mut CommandSource,
        _subcommand: &str,
    ) {
        send_syntax(source, self.def());
    }
}

/// Reply with the standard syntax-error form for `def`.
pub fn send_syntax(source: &CommandSource, def: &CommandDef) {
    match def.syntax.first() {
        Some(syntax) => source.reply(&format!("Syntax: \x02{} {}\x02", source.command, syntax)),
        None => source.reply(&format!("Syntax: \x02{}\x02", source.command)),
    }
    source.reply(&format!(
        "\x02/msg {} HELP {}\x02 for more information.",
        source.bot.nick, source.command
    ));
}

/// One command's registration on a service bot.
#[derive(Debug, Clone, Default)]
pub struct CommandInfo {
    /// Service name of the command, e.g. `"generic/help"`.
    pub name: String,
    /// User-visible name.
    pub cname: String,
    /// Permission required to execute the command; empty for none.
    pub permission: String,
    /// Help group this command is listed under.
    pub group: String,
    /// Hide from help output.
    pub hide: bool,
    /// Fantasy invocations prepend the channel as the first parameter.
    pub prepend_channel: bool,
}

/// Where command replies go. The caller owns destination and formatting;
/// the engine only ever performs this one operation.
pub trait CommandReply: Send + Sync {
    /// Deliver `message` on behalf of `source` (the replying bot).
    fn send_message(&self, source: &str, message: &str);
}

/// A pseudo-client through which commands are issued.
///
/// The command table maps casefolded display names to registrations; it is
/// ordered, so listings and reverse lookups within one bot are
/// deterministic.
pub struct ServiceBot {
    /// Nickname presented to the network.
    pub nick: String,
    /// UID the bot was introduced under.
    pub uid: String,
    /// Ident.
    pub user: String,
    /// Hostname.
    pub host: String,
    /// Real-name field.
    pub realname: String,
    commands: RwLock<BTreeMap<String, CommandInfo>>,
}

impl ServiceBot {
    /// Create a bot with an empty command table.
    pub fn new(nick: &str, uid: &str, user: &str, host: &str, realname: &str) -> Self {
        Self {
            nick: nick.to_string(),
            uid: uid.to_string(),
            user: user.to_string(),
            host: host.to_string(),
            realname: realname.to_string(),
            commands: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a command under `cname`. At most one registration exists
    /// per name; re-registration replaces.
    pub fn set_command(&self, cname: &str, mut info: CommandInfo) {
        info.cname = cname.to_string();
        self.commands.write().insert(irc_to_lower(cname), info);
    }

    /// Remove a command registration, e.g. on module unload.
    pub fn unset_command(&self, cname: &str) -> bool {
        self.commands.write().remove(&irc_to_lower(cname)).is_some()
    }

    /// Case-insensitive lookup of a command registration.
    pub fn get_command(&self, cname: &str) -> Option<CommandInfo> {
        self.commands.read().get(&irc_to_lower(cname)).cloned()
    }

    /// All registrations, ordered by casefolded display name.
    pub fn command_list(&self) -> Vec<CommandInfo> {
        self.commands.read().values().cloned().collect()
    }

    /// Display name of the first registration whose service name matches.
    pub fn find_cname_for_service(&self, service: &str) -> Option<String> {
        self.commands
            .read()
            .values()
            .find(|info| info.name == service)
            .map(|info| info.cname.clone())
    }
}

/// Registry of service bots, in registration order.
#[derive(Default)]
pub struct BotRegistry {
    bots: RwLock<Vec<Arc<ServiceBot>>>,
}

impl BotRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bot. Order of registration is observable through
    /// [`find_command_from_service`].
    pub fn register(&self, bot: Arc<ServiceBot>) {
        self.bots.write().push(bot);
    }

    /// Look up a bot by nickname (casefolded) or UID.
    pub fn find(&self, query: &str) -> Option<Arc<ServiceBot>> {
        let folded = irc_to_lower(query);
        self.bots
            .read()
            .iter()
            .find(|b| irc_to_lower(&b.nick) == folded || b.uid == query)
            .cloned()
    }

    /// The first-registered bot, the default target for fantasy triggers.
    pub fn first(&self) -> Option<Arc<ServiceBot>> {
        self.bots.read().first().cloned()
    }

    /// Snapshot of every bot, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<ServiceBot>> {
        self.bots.read().clone()
    }
}

/// Process-wide map of command instances, keyed by service name.
#[derive(Default)]
pub struct CommandMap {
    map: RwLock<HashMap<String, Arc<dyn Command>>>,
}

impl CommandMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command instance under its service name.
    pub fn register(&self, service: &str, command: Arc<dyn Command>) {
        self.map.write().insert(service.to_string(), command);
    }

    /// Remove a command instance, e.g. on module unload.
    pub fn unregister(&self, service: &str) -> bool {
        self.map.write().remove(service).is_some()
    }

    /// Resolve a service name to its command instance.
    pub fn get(&self, service: &str) -> Option<Arc<dyn Command>> {
        self.map.read().get(service).cloned()
    }
}

/// Per-invocation execution context, created fresh for every command and
/// discarded after the reply.
pub struct CommandSource {
    /// Nickname of the invoker.
    pub nick: String,
    /// UID of the invoking user; absent for server-originated invocations.
    pub user: Option<String>,
    /// Resolved account of the invoker, if identified.
    pub account: Option<Account>,
    /// Channel of a fantasy invocation.
    pub channel: Option<String>,
    /// The bot the command was addressed to.
    pub bot: Arc<ServiceBot>,
    /// Resolved display name of the running command.
    pub command: String,
    /// Permission of the running command.
    pub permission: String,
    reply: Arc<dyn CommandReply>,
}

impl CommandSource {
    /// Build a context for an invocation addressed to `bot`.
    pub fn new(
        nick: &str,
        user: Option<String>,
        account: Option<Account>,
        reply: Arc<dyn CommandReply>,
        bot: Arc<ServiceBot>,
    ) -> Self {
        Self {
            nick: nick.to_string(),
            user,
            account,
            channel: None,
            bot,
            command: String::new(),
            permission: String::new(),
            reply,
        }
    }

    /// Send a reply to the invoker through the configured sink.
    pub fn reply(&self, message: &str) {
        self.reply.send_message(&self.bot.nick, message);
    }

    /// True when the invoker's account holds `wanted`.
    pub fn has_priv(&self, wanted: &str) -> bool {
        self.account.as_ref().is_some_and(|a| a.has_priv(wanted))
    }
}

/// Split invocation text into parameter slots.
///
/// Tokens are single-space separated; with a bound, everything from the
/// last slot onward is folded into one parameter with its spacing
/// preserved.
pub fn split_params(text: &str, max_params: Option<usize>) -> Vec<String> {
    let mut params = Vec::new();
    let mut stream = TokenStream::new(text);
    while let Some(tok) = stream.token() {
        if tok.is_empty() {
            continue;
        }
        if let Some(max) = max_params {
            if params.len() + 1 == max {
                if stream.at_end() {
                    params.push(tok.to_string());
                } else {
                    params.push(format!("{} {}", tok, stream.remaining()));
                }
                break;
            }
        }
        params.push(tok.to_string());
    }
    params
}

/// Top-level entry: resolve and run the command at the head of `message`.
pub async fn run(core: &Arc<Construct>, mut source: CommandSource, message: &str) {
    let mut stream = TokenStream::new(message);
    let Some(cmd_name) = stream.token().filter(|t| !t.is_empty()) else {
        return;
    };

    let Some(info) = source.bot.get_command(cmd_name) else {
        source.reply(&format!(
            "Unknown command \x02{}\x02. \x02/msg {} HELP\x02 for help.",
            cmd_name, source.bot.nick
        ));
        return;
    };

    let Some(command) = core.commands.get(&info.name) else {
        warn!(service = %info.name, bot = %source.bot.nick, "registered command has no instance");
        source.reply(&format!(
            "Unknown command \x02{}\x02. \x02/msg {} HELP\x02 for help.",
            cmd_name, source.bot.nick
        ));
        return;
    };

    let mut params = split_params(stream.remaining(), command.def().max_params);
    if info.prepend_channel {
        if let Some(channel) = &source.channel {
            params.insert(0, channel.clone());
        }
    }

    source.command = info.cname.clone();
    source.permission = info.permission.clone();

    execute(core, &mut source, command.as_ref(), &params).await;
}

/// Instance-level run: enforce arity, registration and permission, then
/// invoke `execute`.
async fn execute(
    core: &Arc<Construct>,
    source: &mut CommandSource,
    command: &dyn Command,
    params: &[String],
) {
    let def = command.def();

    if params.len() < def.min_params {
        let subcommand = params.first().cloned().unwrap_or_default();
        command.on_syntax_error(core, source, &subcommand).await;
        return;
    }

    if source.account.is_none() && !def.allow_unregistered {
        source.reply("You must be identified to an account to use that command.");
        return;
    }

    if def.require_user && source.user.is_none() {
        source.reply("Access denied.");
        return;
    }

    if !source.permission.is_empty() && !source.has_priv(&source.permission) {
        info!(
            nick = %source.nick,
            command = %source.command,
            permission = %source.permission,
            "denied access to command"
        );
        source.reply("Access denied.");
        return;
    }

    command.execute(core, source, params).await;
}

/// Help entry point: ask the command for help, falling back to a generic
/// reply when it declines. Never invokes `execute`.
pub async fn help(
    core: &Arc<Construct>,
    source: &mut CommandSource,
    command: &dyn Command,
    subcommand: &str,
) {
    if !command.on_help(core, source, subcommand).await {
        source.reply(&format!(
            "No help available for \x02{}\x02.",
            source.command
        ));
    }
}

/// Look up which bot a service name is registered on.
///
/// Bots are scanned in registration order, so a service name registered on
/// more than one bot resolves to the earliest-registered one; the result is
/// order-dependent by design, not arbitrary-safe.
pub fn find_command_from_service(
    core: &Construct,
    service: &str,
) -> Option<(Arc<ServiceBot>, String)> {
    for bot in core.bots.snapshot() {
        if let Some(cname) = bot.find_cname_for_service(service) {
            return Some((bot, cname));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_honours_the_bound() {
        assert_eq!(split_params("A B C D", Some(2)), vec!["A", "B C D"]);
        assert_eq!(split_params("A B C D", Some(1)), vec!["A B C D"]);
        assert_eq!(split_params("A B C D", None), vec!["A", "B", "C", "D"]);
        assert_eq!(split_params("", None), Vec::<String>::new());
    }

    #[test]
    fn split_preserves_trailing_spacing() {
        assert_eq!(
            split_params("SET greeting hello  there", Some(2)),
            vec!["SET", "greeting hello  there"]
        );
    }

    #[test]
    fn bot_command_table_is_case_insensitive_and_ordered() {
        let bot = ServiceBot::new("NickServ", "0SLAAAAAA", "services", "services.host", "svc");
        bot.set_command(
            "REGISTER",
            CommandInfo {
                name: "nickserv/register".into(),
                ..Default::default()
            },
        );
        bot.set_command(
            "DROP",
            CommandInfo {
                name: "nickserv/drop".into(),
                ..Default::default()
            },
        );

        assert_eq!(
            bot.get_command("register").unwrap().name,
            "nickserv/register"
        );
        let names: Vec<String> = bot.command_list().iter().map(|i| i.cname.clone()).collect();
        assert_eq!(names, vec!["DROP", "REGISTER"]);

        assert!(bot.unset_command("DROP"));
        assert!(bot.get_command("drop").is_none());
    }
}
