//! /search command - toggle web-search grounding

use super::CommandResult;

pub struct SearchCommand;

impl SearchCommand {
    pub fn execute(args: &str, current: bool) -> CommandResult {
        match args.to_lowercase().as_str() {
            "" => CommandResult::SetSearch(!current),
            "on" | "true" | "1" => CommandResult::SetSearch(true),
            "off" | "false" | "0" => CommandResult::SetSearch(false),
            _ => CommandResult::Message(format!("Usage: /search [on|off] (got '{}')", args)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle() {
        assert!(matches!(SearchCommand::execute("", false), CommandResult::SetSearch(true)));
        assert!(matches!(SearchCommand::execute("OFF", true), CommandResult::SetSearch(false)));
        assert!(matches!(SearchCommand::execute("maybe", true), CommandResult::Message(_)));
    }
}
