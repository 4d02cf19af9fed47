// Terminal driver for the ADA study client
//
// Reads participant input from stdin and prints the conversation to stdout.
// Configuration comes from ADA_* environment variables.

use std::io::Write;

use ada_client::{
    AdaClient, AdaError, ArticleId, ClientOptions, InboundEvent, OptionId, Transport,
};
use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Type a message and press enter to send it. Commands:
  /reply <id>        pick a quick reply
  /style             switch conversation style (last task only)
  /bookmark <id>     bookmark a recommended article
  /unbookmark <id>   remove a bookmark
  /explain <id>      ask why an article was recommended
  /summary <id>      expand or collapse an article summary
  /bookmarks         list bookmarks
  /prefs             request preference topics
  /forget <topic>    remove a preference topic
  /hints             show the task hints
  /done              finish the current task
  /reconnect         reconnect to the agent
  /quit              leave";

enum Input {
    Event(Option<InboundEvent>),
    Line(Option<String>),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let options = ClientOptions::from_env().context("Invalid ADA_* configuration")?;
    let name = options.name.clone();
    let mut client = AdaClient::from_options(options).context("Failed to create client")?;
    println!("{name} - participant {}", client.token().id);

    enter_task(&mut client).await?;
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut channel_open = true;
    loop {
        let input = tokio::select! {
            event = client.process_next_event(), if channel_open => Input::Event(event),
            line = lines.next_line() => Input::Line(line?),
        };

        match input {
            Input::Event(Some(event)) => render(&client, &event)?,
            Input::Event(None) => {
                println!(
                    "\n[channel closed: {:?}, /reconnect to retry]",
                    client.channel_state()
                );
                channel_open = false;
            }
            Input::Line(Some(line)) => {
                if !handle_line(&mut client, line.trim()).await? {
                    break;
                }
                channel_open |= client.channel_state().is_connected();
            }
            Input::Line(None) => break,
        }
    }

    client.close().await?;
    Ok(())
}

async fn enter_task<T: Transport + 'static>(client: &mut AdaClient<T>) -> Result<()> {
    let task = client.enter_task(None).await?;
    println!(
        "\n=== Task {} - topic {} of set {} - {} style{} ===",
        task.slot + 1,
        task.topic_index + 1,
        task.topic_set_id,
        task.style,
        if task.style_switchable {
            " (switchable)"
        } else {
            ""
        }
    );
    Ok(())
}

fn render<T: Transport + 'static>(client: &AdaClient<T>, event: &InboundEvent) -> Result<()> {
    let mut out = std::io::stdout().lock();
    match event {
        InboundEvent::Message(frame) if frame.is_new() => write!(out, "\nADA: {}", frame.text)?,
        InboundEvent::Message(frame) => write!(out, "{}", frame.text)?,
        InboundEvent::EndOfTurn => writeln!(out)?,
        InboundEvent::Options(_) => {
            for option in client.chat().quick_replies() {
                writeln!(out, "  [{}] {}", option.id, option.short_label)?;
            }
        }
        InboundEvent::Recommendations(articles) => {
            writeln!(out, "\nRecommendations:")?;
            for article in articles {
                writeln!(
                    out,
                    "  {} {} ({:.2})",
                    article.id, article.title, article.relevance_score
                )?;
            }
        }
        InboundEvent::Preferences(topics) => {
            writeln!(out, "\nPreferences: {}", topics.join(", "))?;
        }
        InboundEvent::ConnectError { reason } | InboundEvent::Disconnected { reason } => {
            writeln!(out, "\n[connection problem: {reason}]")?;
        }
        _ => {}
    }
    out.flush()?;
    Ok(())
}

/// Returns `false` when the participant leaves
async fn handle_line<T: Transport + 'static>(
    client: &mut AdaClient<T>,
    line: &str,
) -> Result<bool> {
    let (command, argument) = match line.split_once(' ') {
        Some((command, argument)) => (command, argument.trim()),
        None => (line, ""),
    };

    let outcome: ada_client::Result<()> = match command {
        "/quit" => return Ok(false),
        "/help" => {
            println!("{HELP}");
            Ok(())
        }
        "/reply" => {
            let id = argument
                .parse::<i64>()
                .map_or_else(|_| OptionId::from(argument), OptionId::from);
            client.chat().select_quick_reply(&id)
        }
        "/style" => client.chat().toggle_style().map(|style| {
            println!("[style: {style}]");
        }),
        "/bookmark" => client
            .side_panel()
            .add_bookmark(&ArticleId::from(argument))
            .map(|_| ()),
        "/unbookmark" => {
            client.side_panel().remove_bookmark(&ArticleId::from(argument));
            Ok(())
        }
        "/explain" => client
            .side_panel()
            .request_explanation(&ArticleId::from(argument)),
        "/summary" => {
            client.side_panel().toggle_summary(&ArticleId::from(argument));
            Ok(())
        }
        "/bookmarks" => {
            for article in client.side_panel().bookmarks() {
                println!("  {} {}", article.id, article.title);
            }
            Ok(())
        }
        "/prefs" => {
            client.preferences().request_preferences();
            Ok(())
        }
        "/forget" => {
            client.preferences().remove_preference(argument);
            Ok(())
        }
        "/hints" => {
            client.set_hints_open(true);
            client.set_hints_open(false);
            Ok(())
        }
        "/reconnect" => client.reconnect().await,
        "/done" => {
            let finished = client.current_task().is_some_and(|task| task.is_last());
            client.navigate(if finished { "post-all-tasks" } else { "post-task" });
            client.complete_task(None)?;
            if finished {
                client.finish_study()?;
                println!("Thank you for participating in the study!");
                return Ok(false);
            }
            client.navigate("task");
            enter_task(client).await?;
            Ok(())
        }
        _ if line.starts_with('/') => {
            println!("Unknown command, /help lists them");
            Ok(())
        }
        _ => {
            for ch in line.chars() {
                client.chat().record_keystroke(ch.to_string());
            }
            client.chat().send_message(line).map(|_| ())
        }
    };

    match outcome {
        Ok(()) => {}
        Err(AdaError::Busy) => println!("[ADA is still replying]"),
        Err(e) => println!("[{e}]"),
    }
    Ok(true)
}
