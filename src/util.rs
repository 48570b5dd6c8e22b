//! Small shared helpers: wire text encoding, prompts, terminal size.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use std::io::{self, BufRead, IsTerminal, Write};

/// Encode text as Base64 for the wire; empty input stays empty.
pub fn to_base64(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    B64.encode(s.as_bytes())
}

/// Encode raw bytes as Base64 for the wire.
pub fn bytes_to_base64(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    B64.encode(bytes)
}

/// Decode Base64 wire text, lossily replacing invalid UTF-8.
///
/// Undecodable input yields an empty string rather than an error: process
/// output chunks are best-effort display data, not structured payloads.
pub fn from_base64(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    match B64.decode(s.trim()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
        Err(_) => String::new(),
    }
}

/// Ask the user a y/n question with a default, re-asking until valid.
///
/// Presented as `Prompt [Yn]` or `Prompt [yN]` depending on the default.
pub fn ask_confirm(prompt: &str, default: bool) -> io::Result<bool> {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        let suffix = if default { "[Yn]" } else { "[yN]" };
        eprint!("{prompt} {suffix} ");
        io::stderr().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF: take the default rather than looping forever.
            return Ok(default);
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            "" => return Ok(default),
            _ => {
                let hint = if default { "yes" } else { "no" };
                eprintln!("Enter either y/yes or n/no, or nothing for default ({hint})");
            }
        }
    }
}

/// Current terminal size as (cols, rows), with an 80x24 fallback.
pub fn terminal_size() -> (u16, u16) {
    if io::stderr().is_terminal() {
        if let Ok(size) = crossterm::terminal::size() {
            return size;
        }
    }
    (80, 24)
}
