//! Slash commands for interactive mode

mod personality;
mod search;

pub use personality::PersonalityCommand;
pub use search::SearchCommand;

use vsai_ai::Personality;

/// Result of executing a slash command
#[derive(Debug)]
pub enum CommandResult {
    /// Clear the conversation and its stored history
    Clear,
    /// Change the assistant persona
    SetPersonality(Personality),
    /// Turn search grounding on or off
    SetSearch(bool),
    /// Attach an image file to the next message
    Attach(String),
    /// Toggle speaking answers aloud
    Voice,
    /// Speak the last answer again
    Speak,
    /// Stop speech playback
    Stop,
    /// Record a spoken prompt and send it as a voice turn
    Listen,
    /// Show a message to the user (not sent to the model)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(
    input: &str,
    personality: Personality,
    search_enabled: bool,
) -> Option<CommandResult> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let parts: Vec<&str> = rest.splitn(2, ' ').collect();
    let command = parts[0].to_lowercase();
    let args = parts.get(1).map(|s| s.trim()).unwrap_or("");

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "clear" | "c" => CommandResult::Clear,

        "quit" | "exit" | "q" => CommandResult::Exit,

        "personality" | "p" => PersonalityCommand::execute(args, personality),

        "search" | "s" => SearchCommand::execute(args, search_enabled),

        "image" | "i" => {
            if args.is_empty() {
                CommandResult::Message("Usage: /image <path>".to_string())
            } else {
                CommandResult::Attach(args.to_string())
            }
        }

        "examples" | "e" => CommandResult::Message(examples_message()),

        "voice" | "v" => CommandResult::Voice,

        "speak" => CommandResult::Speak,

        "stop" => CommandResult::Stop,

        "listen" | "l" => CommandResult::Listen,

        _ => CommandResult::Unknown(command),
    })
}

pub fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?             Show this help message
  /personality, /p [name]   Show or set the personality (friendly/professional/humorous)
  /search, /s [on|off]      Toggle web search grounding
  /image, /i <path>         Attach an image to the next message
  /examples, /e             Show example prompts
  /voice, /v                Toggle voice mode (answers are spoken)
  /speak                    Speak the last answer
  /stop                     Stop speaking
  /listen, /l               Speak a prompt (press Enter when done); the answer is spoken
  /clear, /c                Clear the conversation and its history
  /quit, /exit, /q          Exit vsai

Press Ctrl-C while an answer is streaming to stop it.

Examples:
  /personality humorous     Switch to the humorous persona
  /image ./cat.png          Then type "make it black and white""#
        .to_string()
}

/// Suggestions shown when a conversation is empty
const EXAMPLE_PROMPTS: &[(&str, &str)] = &[
    (
        "Imagine a scene",
        "Generate an image of a futuristic city at sunset, with flying cars.",
    ),
    (
        "Explain a concept",
        "Explain the concept of quantum computing in simple terms.",
    ),
    (
        "Write a script",
        "Write a Python script to scrape headlines from a news website.",
    ),
    (
        "Plan a trip",
        "Plan a 3-day itinerary for a trip to Tokyo, Japan.",
    ),
    (
        "Find the latest news",
        "What are the top 5 largest economies in the world right now?",
    ),
    (
        "Get creative",
        "Write a short story about a friendly robot who discovers music.",
    ),
];

pub fn examples_message() -> String {
    let mut output = String::from("How can I help you today? Try:\n\n");
    for (title, prompt) in EXAMPLE_PROMPTS {
        output.push_str(&format!("  {:<22} {}\n", title, prompt));
    }
    output
}
