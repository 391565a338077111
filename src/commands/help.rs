//! The generic HELP command, registered on every bot as `generic/help`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::{help, Command, CommandDef, CommandInfo, CommandSource};
use crate::state::Construct;

/// Lists a bot's visible commands, or routes help for one of them.
pub struct HelpCommand {
    def: CommandDef,
}

impl HelpCommand {
    /// Create the command.
    pub fn new() -> Self {
        Self {
            def: CommandDef::new(0, None)
                .desc("Displays this list and give information about commands")
                .syntax("[\x02command\x02]")
                .allow_unregistered(),
        }
    }

    fn list_commands(&self, source: &CommandSource, core: &Arc<Construct>) {
        source.reply(&format!("\x02{}\x02 commands:", source.bot.nick));

        let mut groups: BTreeMap<String, Vec<CommandInfo>> = BTreeMap::new();
        for info in source.bot.command_list() {
            if info.hide {
                continue;
            }
            if !info.permission.is_empty() && !source.has_priv(&info.permission) {
                continue;
            }
            groups.entry(info.group.clone()).or_default().push(info);
        }

        for (group, infos) in groups {
            if !group.is_empty() {
                source.reply(&format!("\x02{}\x02:", group));
            }
            for info in infos {
                let desc = core
                    .commands
                    .get(&info.name)
                    .map(|c| c.def().desc.clone())
                    .unwrap_or_default();
                source.reply(&format!("    \x02{:<14}\x02 {}", info.cname, desc));
            }
        }
    }
}

impl Default for HelpCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Command for HelpCommand {
    fn def(&self) -> &CommandDef {
        &self.def
    }

    async fn execute(&self, core: &Arc<Construct>, source: &mut CommandSource, params: &[String]) {
        let Some(cname) = params.first() else {
            self.list_commands(source, core);
            return;
        };

        let Some(info) = source.bot.get_command(cname) else {
            source.reply(&format!("No help available for \x02{}\x02.", cname));
            return;
        };
        let Some(command) = core.commands.get(&info.name) else {
            source.reply(&format!("No help available for \x02{}\x02.", cname));
            return;
        };
        if !info.permission.is_empty() && !source.has_priv(&info.permission) {
            source.reply(&format!("No help available for \x02{}\x02.", cname));
            return;
        }

        source.command = info.cname.clone();
        source.permission = info.permission.clone();
        let subcommand = params[1..].join(" ");
        help(core, source, command.as_ref(), &subcommand).await;
    }

    async fn on_help(
        &self,
        _core: &Arc<Construct>,
        source: &mut CommandSource,
        _subcommand: &str,
    ) -> bool {
        source.reply("\x02HELP\x02 with no arguments lists the available commands.");
        source.reply("\x02HELP command\x02 gives detailed help on that command.");
        true
    }
}
