use crate::entity::Entity;
use crate::error::ProtocolError;
use crate::verify::check_command;

/// Splits off everything up to the first `separator`, which is consumed.
fn next_split<'a>(buffer: &mut &'a str, separator: char) -> &'a str {
    let text: &'a str = *buffer;
    match text.split_once(separator) {
        Some((head, tail)) => {
            *buffer = tail;
            head
        }
        None => std::mem::take(buffer),
    }
}

fn next_line<'a>(buffer: &mut &'a str) -> &'a str {
    next_split(buffer, '\n')
}

fn next_unquoted<'a>(buffer: &mut &'a str) -> &'a str {
    next_split(buffer, ' ')
}

/// Reads a quoted token; `buffer` must start with the opening quote.
fn next_quoted<'a>(buffer: &mut &'a str) -> Result<String, ProtocolError> {
    let text: &'a str = *buffer;
    let mut value = String::new();
    let mut chars = text.char_indices().skip(1);

    while let Some((i, ch)) = chars.next() {
        match ch {
            '\\' => {
                let (_, escaped) = chars.next().ok_or(ProtocolError::ClosingQuoteMissing)?;
                value.push(escaped);
            }
            '"' => {
                let rest = &text[i + 1..];
                *buffer = match rest.strip_prefix(' ') {
                    Some(rest) => rest,
                    None if rest.is_empty() => rest,
                    None => return Err(ProtocolError::GarbageAfterClosingQuote),
                };
                return Ok(value);
            }
            ch => value.push(ch),
        }
    }

    Err(ProtocolError::ClosingQuoteMissing)
}

fn parse_args(mut line: &str) -> Result<Vec<String>, ProtocolError> {
    let mut args = Vec::new();
    loop {
        line = line.trim_start_matches(|ch: char| ch.is_ascii_whitespace());
        if line.is_empty() {
            return Ok(args);
        }

        if line.starts_with('"') {
            args.push(next_quoted(&mut line)?);
        } else {
            args.push(next_unquoted(&mut line).to_string());
        }
    }
}

/// Parses one datagram payload.
///
/// Everything after the first NUL byte is the body and is never looked at.
pub fn parse_entity(payload: &[u8]) -> Result<Entity, ProtocolError> {
    let (text, body) = match payload.iter().position(|&b| b == 0) {
        Some(nul) => (&payload[..nul], Some(&payload[nul + 1..])),
        None => (payload, None),
    };
    let mut text = std::str::from_utf8(text).map_err(|_| ProtocolError::MalformedUtf8)?;

    let mut line = next_line(&mut text);
    let command = next_unquoted(&mut line);
    check_command(command)?;

    let mut entity = Entity::new(command);
    entity.args = parse_args(line)?;

    loop {
        let line = next_line(&mut text);
        if line.is_empty() {
            break;
        }

        let (name, value) = line
            .split_once(':')
            .filter(|(name, _)| !name.is_empty())
            .ok_or(ProtocolError::BadHeaderSyntax)?;
        let value = value.trim_start_matches(|ch: char| ch.is_ascii_whitespace());
        entity.headers.insert(name.to_string(), value.to_string());
    }

    entity.body = body.filter(|body| !body.is_empty()).map(<[u8]>::to_vec);
    Ok(entity)
}
