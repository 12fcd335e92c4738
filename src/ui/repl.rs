//! Interactive read-eval-print loop over an engine handle.
//!
//! Line editing runs on a dedicated thread because rustyline is synchronous;
//! lines reach the async side through an unbounded channel. A second task
//! prints broadcast notices as they arrive and repaints the prompt, the
//! same way incoming chat is interleaved with input.

use std::io::Write;
use std::sync::{Arc, Mutex};

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::{broadcast, mpsc};

use super::formatter::MessageFormatter;
use crate::domain::value_object::RoomId;
use crate::infrastructure::dto::http::RegisterRequest;
use crate::session::{EngineHandle, EngineNotice};

/// Prompt pieces owned jointly by the readline thread and the notice task
#[derive(Default)]
struct PromptState {
    username: Option<String>,
    room: Option<String>,
}

impl PromptState {
    fn render(&self) -> String {
        match (&self.username, &self.room) {
            (Some(username), Some(room)) => format!("{}@{}> ", username, room),
            (Some(username), None) => format!("{}> ", username),
            _ => "> ".to_string(),
        }
    }
}

type SharedPrompt = Arc<Mutex<PromptState>>;

fn current_prompt(prompt: &SharedPrompt) -> String {
    prompt
        .lock()
        .map(|state| state.render())
        .unwrap_or_else(|_| "> ".to_string())
}

/// Redisplay the prompt after interleaved output
fn redisplay_prompt(prompt: &str) {
    print!("{}", prompt);
    std::io::stdout().flush().ok();
}

/// Run the interactive loop until the user quits or input ends.
pub async fn run_repl(handle: EngineHandle) {
    println!("\nWelcome to chanoma. Type /help for commands, /quit to exit.\n");

    let prompt: SharedPrompt = Arc::new(Mutex::new(PromptState::default()));

    // seed the prompt from whatever state the engine is already in
    let member = handle.member().await;
    let report = handle.status().await;
    if let Ok(mut state) = prompt.lock() {
        state.username = member.map(|m| m.username.to_string());
        state.room = report.active_room.map(|r| r.to_string());
    }

    // Spawn a task to print broadcast notices
    let printer_handle = handle.clone();
    let printer_prompt = prompt.clone();
    let mut notices = handle.subscribe();
    let notice_task = tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => print_notice(notice, &printer_handle, &printer_prompt).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Display fell behind; skipped {} notices", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Create channel for rustyline input
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // Spawn a blocking thread for rustyline (synchronous readline)
    let readline_prompt = prompt.clone();
    let _readline_handle = std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        loop {
            let prompt = current_prompt(&readline_prompt);
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            // Channel closed, exit thread
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    while let Some(line) = input_rx.recv().await {
        if dispatch_line(&handle, &line).await {
            break;
        }
    }

    notice_task.abort();
}

/// Handle one input line. Returns true when the loop should end.
async fn dispatch_line(handle: &EngineHandle, line: &str) -> bool {
    if let Some(rest) = line.strip_prefix('/') {
        let mut parts = rest.split_whitespace();
        let command = parts.next().unwrap_or("");
        let args: Vec<&str> = parts.collect();
        run_command(handle, command, &args).await
    } else {
        send_to_active_room(handle, line).await;
        false
    }
}

async fn run_command(handle: &EngineHandle, command: &str, args: &[&str]) -> bool {
    match command {
        "help" => print!("{}", MessageFormatter::format_help()),
        "login" => match args {
            [username, password] => {
                if let Err(e) = handle.login(username, password).await {
                    println!("{}", e);
                }
            }
            _ => println!("usage: /login <username> <password>"),
        },
        "logout" => {
            if let Err(e) = handle.logout().await {
                println!("{}", e);
            }
        }
        "register" => match args {
            [first_name, last_name, username, email, password, discord_username] => {
                let request = RegisterRequest {
                    first_name: (*first_name).to_string(),
                    last_name: (*last_name).to_string(),
                    username: (*username).to_string(),
                    email: (*email).to_string(),
                    password: (*password).to_string(),
                    discord_username: (*discord_username).to_string(),
                };
                match handle.register(request).await {
                    Ok(id) => println!("registered (member id {}); you can now /login", id),
                    Err(e) => println!("{}", e),
                }
            }
            _ => println!(
                "usage: /register <first> <last> <username> <email> <password> <discord>"
            ),
        },
        "connect" => handle.connect(),
        "disconnect" => handle.disconnect(),
        "join" => match args {
            [room] => match RoomId::new((*room).to_string()) {
                Ok(room) => handle.switch_room(room),
                Err(e) => println!("{}", e),
            },
            _ => println!("usage: /join <room>"),
        },
        "leave" => match handle.status().await.active_room {
            Some(room) => handle.leave_room(room),
            None => println!("not in a room"),
        },
        "rooms" => {
            let rooms = handle.rooms().await;
            let active = handle.status().await.active_room;
            print!("{}", MessageFormatter::format_rooms(&rooms, active.as_ref()));
        }
        "who" => match handle.status().await.active_room {
            Some(room) => {
                let typists = handle.typists(room.clone()).await;
                if typists.is_empty() {
                    println!("nobody is typing in #{}", room);
                } else {
                    print!("{}", MessageFormatter::format_typing(&room, &typists));
                }
            }
            None => println!("not in a room"),
        },
        "history" => {
            let room = match args.first() {
                Some(name) => RoomId::new((*name).to_string()),
                None => match handle.status().await.active_room {
                    Some(room) => Ok(room),
                    None => {
                        println!("not in a room; try /history <room>");
                        return false;
                    }
                },
            };
            match room {
                Ok(room) => {
                    let messages = handle.history(room.clone()).await;
                    print!("{}", MessageFormatter::format_history(&room, &messages));
                }
                Err(e) => println!("{}", e),
            }
        }
        "status" => {
            let report = handle.status().await;
            print!("{}", MessageFormatter::format_status(&report));
        }
        "quit" => return true,
        other => println!("unknown command '/{}'; try /help", other),
    }
    false
}

async fn send_to_active_room(handle: &EngineHandle, line: &str) {
    let Some(room) = handle.status().await.active_room else {
        println!("join a room first: /join general");
        return;
    };
    if handle.send_chat(room.clone(), line).await {
        // sending a message also clears our typing indicator
        handle.set_typing(room, false);
    } else {
        println!("(message not delivered)");
    }
}

async fn print_notice(notice: EngineNotice, handle: &EngineHandle, prompt: &SharedPrompt) {
    match notice {
        EngineNotice::MessageAdded { message } => {
            print!("{}", MessageFormatter::format_message(&message));
        }
        EngineNotice::StatusChanged { status, detail } => match detail {
            Some(detail) => print!("\n! connection {} ({})\n", status, detail),
            None => print!("\n! connection {}\n", status),
        },
        EngineNotice::SessionChanged { username } => {
            if let Ok(mut state) = prompt.lock() {
                state.username = username.as_ref().map(|u| u.to_string());
            }
            match username {
                Some(username) => print!("\n* logged in as {}\n", username),
                None => print!("\n* logged out\n"),
            }
        }
        EngineNotice::ActiveRoomChanged { room } => {
            // the join/leave notice message already announces this;
            // only the prompt needs updating
            if let Ok(mut state) = prompt.lock() {
                state.room = room.as_ref().map(|r| r.to_string());
            }
        }
        EngineNotice::TypingChanged { room } => {
            let typists = handle.typists(room.clone()).await;
            let formatted = MessageFormatter::format_typing(&room, &typists);
            if !formatted.is_empty() {
                print!("{}", formatted);
            }
        }
    }
    redisplay_prompt(&current_prompt(prompt));
}
