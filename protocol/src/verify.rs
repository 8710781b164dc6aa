use crate::error::ProtocolError;

pub fn is_valid_command_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Rejects anything but a non-empty run of ASCII letters, digits and
/// underscores.
pub fn check_command(command: &str) -> Result<(), ProtocolError> {
    if command.is_empty() {
        return Err(ProtocolError::EmptyCommand);
    }

    if !command.chars().all(is_valid_command_char) {
        return Err(ProtocolError::MalformedCommand);
    }

    Ok(())
}
