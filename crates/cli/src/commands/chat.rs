use std::io::{self, BufRead, Write};

use nexus_agent::{BlockingAssistant, ReplyOutcome};

use super::ask::CANCELLATION_NOTICE;
use super::{connect, CommandResult, EXIT_IO_FAILED};

const BANNER: &str = "\
==== Nexus travel assistant ====
Type 'exit' or 'quit' to leave.
Type 'clear' to clear conversation memory and cached answers.
Type 'cache' to show cache stats.
================================";

pub fn run() -> CommandResult {
    let assistant = match connect("chat") {
        Ok(assistant) => assistant,
        Err(failure) => return failure,
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let outcome = session(&assistant, stdin.lock(), stdout.lock());

    if let Err(error) = assistant.close() {
        tracing::warn!(event_name = "cli.chat.close_failed", error = %error, "session close failed");
    }

    match outcome {
        Ok(answered) => {
            CommandResult::success("chat", format!("chat ended after {answered} message(s)"))
        }
        Err(error) => CommandResult::failure("chat", "io", error.to_string(), EXIT_IO_FAILED),
    }
}

/// Runs the read-eval-print loop until `exit`, `quit` or end of input and
/// returns how many messages were handed to the assistant.
pub fn session<R, W>(assistant: &BlockingAssistant, input: R, mut output: W) -> io::Result<usize>
where
    R: BufRead,
    W: Write,
{
    writeln!(output, "{BANNER}")?;
    let mut answered = 0;
    let mut lines = input.lines();

    loop {
        write!(output, "You: ")?;
        output.flush()?;

        let Some(line) = lines.next().transpose()? else {
            writeln!(output)?;
            break;
        };
        let line = line.trim();

        match line.to_lowercase().as_str() {
            "" => continue,
            "exit" | "quit" => break,
            "clear" => {
                assistant.reset();
                writeln!(output, "Memory cleared.")?;
            }
            "cache" => {
                let stats = assistant.cache_stats();
                writeln!(
                    output,
                    "Cache stats: {} of {} entries (ttl {}s)",
                    stats.entries,
                    stats.capacity,
                    stats.ttl.as_secs()
                )?;
            }
            _ => {
                answered += 1;
                match assistant.handle_message(line) {
                    Ok(reply) => {
                        for intent in &reply.intents {
                            writeln!(output, "Intent: {}", intent.summary())?;
                        }
                        match reply.outcome {
                            ReplyOutcome::CancellationRequested => {
                                writeln!(output, "Assistant: {CANCELLATION_NOTICE}")?;
                            }
                            ReplyOutcome::Answer { text } => {
                                writeln!(output, "Assistant: {text}")?;
                            }
                        }
                    }
                    Err(error) => {
                        writeln!(output, "Error: {}", error.into_interface("cli").user_message())?;
                    }
                }
            }
        }
    }

    Ok(answered)
}
