//! In-band command processing
//!
//! A frame whose text starts with the reserved `/command` token is a
//! directive, not chat content. Only `exit` is recognized today;
//! unrecognized directives are ignored rather than rejected so that newer
//! clients can talk to older servers.

/// Reserved token that marks a frame as a directive
pub const COMMAND_PREFIX: &str = "/command";

/// Recognized directives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Terminate the session
    Exit,
}

/// Classification of one inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input<'a> {
    /// Ordinary chat text, relayed to everyone
    Chat(&'a str),
    /// A recognized directive
    Directive(Directive),
    /// Carried the command prefix but no recognized keyword; dropped
    Ignored,
}

/// Classify one inbound frame as chat text or a directive
pub fn classify(text: &str) -> Input<'_> {
    let Some(rest) = text.strip_prefix(COMMAND_PREFIX) else {
        return Input::Chat(text);
    };

    // Prefix must stand alone as the first word
    if !rest.is_empty() && !rest.starts_with(' ') {
        return Input::Chat(text);
    }

    match rest.trim() {
        "exit" => Input::Directive(Directive::Exit),
        _ => Input::Ignored,
    }
}
