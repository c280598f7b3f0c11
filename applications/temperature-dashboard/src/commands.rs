use std::str::FromStr;

use tracing::{info, warn};

use crate::poller::Dashboard;

/// One line typed on standard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Ack(i64),
    Dismiss,
    Reload,
    Quit,
    Help,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Err("empty command".into());
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "ack" => {
                let id = parts.next().ok_or("usage: ack <id>")?;
                let id = id
                    .parse::<i64>()
                    .map_err(|_| format!("invalid alert id: {}", id))?;
                Command::Ack(id)
            }
            "dismiss" => Command::Dismiss,
            "reload" => Command::Reload,
            "quit" | "exit" => Command::Quit,
            "help" | "?" => Command::Help,
            other => return Err(format!("unknown command: {}", other)),
        };

        if parts.next().is_some() {
            return Err(format!("too many arguments for {}", verb));
        }
        Ok(command)
    }
}

pub const HELP: &str = "commands: ack <id> | dismiss | reload | quit | help";

/// Run one command against the dashboard. Dropping the future mid-request
/// leaves the dashboard able to shut down.
pub async fn execute(dashboard: &mut Dashboard, command: Command) {
    match command {
        Command::Ack(id) => {
            if let Err(e) = dashboard.poller().acknowledge(id).await {
                warn!(alert_id = id, error = %e, "Acknowledge failed");
            }
        }
        Command::Dismiss => match dashboard.poller().dismiss().await {
            Ok(Some(alert)) => info!(alert_id = alert.id, "Alarm dismissed and alert acknowledged"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Alarm dismissed locally, server acknowledge failed"),
        },
        Command::Reload => dashboard.restart().await,
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!("ack 12".parse::<Command>(), Ok(Command::Ack(12)));
        assert_eq!("  DISMISS ".parse::<Command>(), Ok(Command::Dismiss));
        assert_eq!("reload".parse::<Command>(), Ok(Command::Reload));
        assert_eq!("exit".parse::<Command>(), Ok(Command::Quit));
        assert_eq!("?".parse::<Command>(), Ok(Command::Help));
    }

    #[test]
    fn test_help_lists_every_verb() {
        for verb in HELP.trim_start_matches("commands:").split('|') {
            let line = verb.trim().replace("<id>", "1");
            assert!(line.parse::<Command>().is_ok(), "{} does not parse", line);
        }
        assert!(HELP.contains("help"));
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<Command>().is_err());
        assert!("ack".parse::<Command>().is_err());
        assert!("ack x1".parse::<Command>().is_err());
        assert!("reload now".parse::<Command>().is_err());
        assert!("refresh".parse::<Command>().is_err());
    }
}
