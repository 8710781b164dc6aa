use std::collections::BTreeMap;

use crate::ERROR;
use crate::OK;

/// A request or a response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Entity {
    pub command: String,
    pub args: Vec<String>,
    /// Sorted by name so that serialization is reproducible.
    pub headers: BTreeMap<String, String>,
    /// An empty body is indistinguishable from a missing one on the wire.
    pub body: Option<Vec<u8>>,
}

impl Entity {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn ok() -> Self {
        Self::new(OK)
    }

    /// An `ERROR` reply, optionally carrying a message as its only argument.
    pub fn error(message: Option<String>) -> Self {
        Self {
            command: ERROR.to_string(),
            args: message.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.command == OK
    }

    pub fn is_error(&self) -> bool {
        self.command == ERROR
    }

    /// Encodes this entity as one datagram payload.
    ///
    /// Arguments that are not plain tokens get quoted. Whitespace, NUL and
    /// other control characters inside a quoted argument are replaced by a
    /// plain space, because the parser splits lines before it tokenizes.
    pub fn serialize(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.serialized_len_hint());
        result.extend_from_slice(self.command.as_bytes());

        for arg in &self.args {
            result.push(b' ');
            push_argument(&mut result, arg);
        }

        if !self.headers.is_empty() {
            result.push(b'\n');
            for (name, value) in &self.headers {
                result.extend_from_slice(name.as_bytes());
                result.push(b':');
                result.extend_from_slice(value.as_bytes());
                result.push(b'\n');
            }
        }

        if let Some(body) = self.body.as_deref().filter(|body| !body.is_empty()) {
            result.push(b'\0');
            result.extend_from_slice(body);
        }

        result
    }

    fn serialized_len_hint(&self) -> usize {
        let args: usize = self.args.iter().map(|arg| arg.len() + 3).sum();
        let headers: usize = self
            .headers
            .iter()
            .map(|(name, value)| name.len() + value.len() + 2)
            .sum();
        let body = self.body.as_ref().map_or(0, |body| body.len() + 1);
        self.command.len() + args + 1 + headers + body
    }
}

fn is_unquoted_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}

fn is_whitespace_or_null(ch: char) -> bool {
    u32::from(ch) <= 0x20
}

fn push_argument(dest: &mut Vec<u8>, arg: &str) {
    if !arg.is_empty() && arg.chars().all(is_unquoted_char) {
        dest.extend_from_slice(arg.as_bytes());
        return;
    }

    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for ch in arg.chars() {
        match ch {
            '\\' | '"' => {
                quoted.push('\\');
                quoted.push(ch);
            }
            ch if is_whitespace_or_null(ch) => quoted.push(' '),
            ch => quoted.push(ch),
        }
    }
    quoted.push('"');
    dest.extend_from_slice(quoted.as_bytes());
}
