//! `insider run`: one turn from the command line.
//!
//! Status events go to stderr and the reply to stdout, so the output can
//! be piped. `--json` prints every event as a JSON array instead.

use std::sync::Arc;

use ei_domain::config::Config;

use crate::auth::Caller;
use crate::bootstrap;
use crate::runtime::{prepare_turn, run_turn, TurnEvent, TurnInput};

pub struct RunArgs {
    pub message: String,
    pub conversation: Option<String>,
    pub tool: Option<String>,
    pub provider: Option<String>,
    pub persona: Option<String>,
    pub user: Option<String>,
    pub json: bool,
}

pub async fn run(config: Arc<Config>, args: RunArgs) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config.clone())?;

    let conversation_id = args
        .conversation
        .unwrap_or_else(|| format!("cli-{}", uuid::Uuid::new_v4()));
    let caller = match args.user {
        Some(user_id) => Caller {
            privileged: config.auth.is_privileged(&user_id, None),
            user_id: Some(user_id),
            email: None,
        },
        None => Caller::anonymous(),
    };

    let input = TurnInput {
        conversation_id: conversation_id.clone(),
        message: args.message,
        tool_id: args.tool,
        tool_title: None,
        provider: args.provider,
        persona: args.persona,
        caller,
    };
    let prepared = prepare_turn(&state, input)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let mut handle = run_turn(state, prepared);

    let mut collected: Vec<TurnEvent> = Vec::new();
    while let Some(event) = handle.events.recv().await {
        if args.json {
            collected.push(event);
            continue;
        }
        match event {
            TurnEvent::Status { status } => {
                let label = serde_json::to_value(status)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_owned))
                    .unwrap_or_default();
                eprintln!("\x1b[2m[{label}]\x1b[0m");
            }
            TurnEvent::Data { reply, debug_info } => {
                if let Some(debug) = debug_info {
                    eprintln!("\x1b[2m[strategy] {}\x1b[0m", debug.stage3_strategy);
                }
                println!("{reply}");
            }
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&collected)
            .map_err(|e| anyhow::anyhow!("serializing events: {e}"))?;
        println!("{json}");
    }
    eprintln!("\x1b[2mconversation: {conversation_id}\x1b[0m");
    Ok(())
}
