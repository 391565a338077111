//! The wintermute daemon entry point.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use wintermute::commands::{CommandInfo, HelpCommand, ServiceBot};
use wintermute::config::{self, Config};
use wintermute::state::Construct;
use wintermute::uplink::{self, QueueSink};
use wintermute::{handlers, telemetry};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "wintermute.toml".to_string());
    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "failed to load config");
        e
    })?;

    info!(
        server = %config.server.name,
        numeric = %config.server.numeric,
        uplink = %config.uplink.host,
        "starting wintermute"
    );

    let (tx, rx) = mpsc::unbounded_channel();
    let core = Arc::new(Construct::new(config, Arc::new(QueueSink::new(tx))));

    handlers::register_core(&core);
    core.commands
        .register("generic/help", Arc::new(HelpCommand::new()));

    for bot_config in core.config.bots.clone() {
        if let Err(e) = config::validate_bot(&bot_config) {
            warn!(error = %e, "service bot failed to load");
            continue;
        }
        let uid = core.uid_allocator.next();
        let realname = if bot_config.realname.is_empty() {
            bot_config.nick.clone()
        } else {
            bot_config.realname.clone()
        };
        let bot = Arc::new(ServiceBot::new(
            &bot_config.nick,
            &uid,
            &bot_config.user,
            &bot_config.host,
            &realname,
        ));
        bot.set_command(
            "HELP",
            CommandInfo {
                name: "generic/help".into(),
                ..Default::default()
            },
        );
        core.bots.register(bot);
        info!(bot = %bot_config.nick, uid = %uid, "service bot loaded");
    }

    uplink::run(core, rx).await
}
