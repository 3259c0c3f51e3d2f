//! /personality command - show and set the assistant persona

use super::CommandResult;
use vsai_ai::Personality;

pub struct PersonalityCommand;

impl PersonalityCommand {
    pub fn execute(args: &str, current: Personality) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Message(show_personalities(current));
        }
        match Personality::parse(args) {
            Some(personality) => CommandResult::SetPersonality(personality),
            None => CommandResult::Message(format!(
                "Unknown personality: '{}'\nValid personalities: friendly, professional, humorous",
                args
            )),
        }
    }
}

fn show_personalities(current: Personality) -> String {
    let personalities = [
        (Personality::Friendly, "Warm and encouraging"),
        (Personality::Professional, "Formal, concise, accurate"),
        (Personality::Humorous, "Witty and clever"),
    ];

    let mut output = String::from("Personalities:\n\n");
    for (personality, desc) in personalities {
        let marker = if personality == current { " *" } else { "" };
        output.push_str(&format!("  {:<14} {}{}\n", personality.name(), desc, marker));
    }
    output.push_str("\nSet with: /personality <name>");
    output
}
