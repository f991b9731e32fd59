use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;
use crate::Error;

/// Returns PONG if no argument is provided, otherwise return a copy of the argument as a bulk.
///
/// Ref: <https://redis.io/docs/latest/commands/ping>
#[derive(Debug, PartialEq)]
pub struct Ping {
    pub payload: Option<Bytes>,
}

impl Executable for Ping {
    fn exec(self) -> Result<Frame, Error> {
        let res = self
            .payload
            .map_or(Frame::Simple("PONG".to_string()), Frame::Bulk);

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for Ping {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let payload = match parser.next_bytes() {
            Ok(payload) => Some(payload),
            Err(CommandParserError::EndOfStream) => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self { payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_replies_with_pong() {
        let cmd = Ping { payload: None };

        assert_eq!(cmd.exec().unwrap(), Frame::Simple("PONG".to_string()));
    }

    #[test]
    fn ping_with_payload_echoes_it_back() {
        let cmd = Ping {
            payload: Some(Bytes::from("hello")),
        };

        assert_eq!(cmd.exec().unwrap(), Frame::Bulk(Bytes::from("hello")));
    }
}
