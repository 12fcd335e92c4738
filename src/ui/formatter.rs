//! Message formatting utilities for terminal display.

use crate::common::time::timestamp_to_rfc3339;
use crate::domain::{
    Message, MessageKind,
    value_object::{RoomId, Username},
};
use crate::session::ConnectionReport;

const SEPARATOR: &str = "------------------------------------------------------------";
const HEADER: &str = "============================================================";

/// Message formatter for terminal display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format a single message as it arrives.
    ///
    /// User messages get the boxed layout; membership and system notices
    /// render as a single starred line.
    pub fn format_message(message: &Message) -> String {
        match message.kind {
            MessageKind::System => format!("\n* {}\n", message.body),
            MessageKind::User => {
                let timestamp_str = timestamp_to_rfc3339(message.timestamp.value());
                format!(
                    "\n\n{}\n@{} in #{}: {}\nsent at {}\n{}\n",
                    SEPARATOR, message.author, message.room_id, message.body, timestamp_str, SEPARATOR
                )
            }
        }
    }

    /// Format a room's history, oldest first.
    pub fn format_history(room: &RoomId, messages: &[Message]) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n\n{}\n", HEADER));
        output.push_str(&format!("#{}: last {} messages\n", room, messages.len()));

        if messages.is_empty() {
            output.push_str("(no messages yet)\n");
        } else {
            for message in messages {
                let timestamp_str = timestamp_to_rfc3339(message.timestamp.value());
                match message.kind {
                    MessageKind::System => {
                        output.push_str(&format!("[{}] * {}\n", timestamp_str, message.body));
                    }
                    MessageKind::User => {
                        output.push_str(&format!(
                            "[{}] @{}: {}\n",
                            timestamp_str, message.author, message.body
                        ));
                    }
                }
            }
        }

        output.push_str(&format!("{}\n", HEADER));
        output
    }

    /// Format the known room list, marking the joined one.
    pub fn format_rooms(rooms: &[RoomId], active: Option<&RoomId>) -> String {
        let mut output = String::from("\nRooms:\n");
        if rooms.is_empty() {
            output.push_str("(none)\n");
        } else {
            for room in rooms {
                let joined_suffix = if active == Some(room) { " (joined)" } else { "" };
                output.push_str(&format!("  #{}{}\n", room, joined_suffix));
            }
        }
        output
    }

    /// Format who is typing in a room. Empty input yields an empty string.
    pub fn format_typing(room: &RoomId, typists: &[Username]) -> String {
        match typists {
            [] => String::new(),
            [only] => format!("\n~ {} is typing in #{}\n", only, room),
            several => {
                let names: Vec<&str> = several.iter().map(Username::as_str).collect();
                format!("\n~ {} are typing in #{}\n", names.join(", "), room)
            }
        }
    }

    /// Format the connection report.
    pub fn format_status(report: &ConnectionReport) -> String {
        let mut output = String::new();
        output.push_str(&format!("\nConnection: {}\n", report.status));
        match &report.active_room {
            Some(room) => output.push_str(&format!("Room: #{}\n", room)),
            None => output.push_str("Room: (none)\n"),
        }
        output.push_str(&format!("Retries: {}\n", report.retry_count));
        if let Some(last_error) = &report.last_error {
            output.push_str(&format!("Last error: {}\n", last_error));
        }
        output
    }

    /// Format the command list.
    pub fn format_help() -> String {
        let mut output = String::from("\nCommands:\n");
        for line in [
            "/login <username> <password>",
            "/logout",
            "/register <first> <last> <username> <email> <password> <discord>",
            "/join <room>",
            "/leave",
            "/rooms",
            "/who",
            "/history [room]",
            "/status",
            "/connect",
            "/disconnect",
            "/quit",
        ] {
            output.push_str(&format!("  {}\n", line));
        }
        output.push_str("Anything else is sent to the current room.\n");
        output
    }
}
