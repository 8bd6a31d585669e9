//! Wire-level parsing for A2S_INFO and legacy `m`-type responses.

/// Result of a successful probe (spec §3 `ServerEntry` cached probe fields,
/// §4.C parsed fields).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub name: String,
    pub map: String,
    pub folder: String,
    pub game: String,
    pub players: u8,
    pub max_players: u8,
}

pub const CONNECTIONLESS_PREFIX: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

pub const TYPE_CHALLENGE: u8 = 0x41; // 'A'
pub const TYPE_SOURCE_INFO: u8 = 0x49; // 'I'
pub const TYPE_LEGACY_INFO: u8 = 0x6D; // 'm'

/// The three query bodies tried in fixed order per spec §4.C steps 1 and 5.
pub const QUERY_BODIES: [&[u8]; 3] = [b"TSource Engine Query\0", b"info\0", b"players\0"];

/// Build one of the three connectionless query datagrams, optionally with a
/// trailing 4-byte challenge appended from a prior `A` response.
#[must_use]
pub fn build_query(body: &[u8], challenge: Option<[u8; 4]>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(CONNECTIONLESS_PREFIX.len() + body.len() + 4);
    buf.extend_from_slice(&CONNECTIONLESS_PREFIX);
    buf.extend_from_slice(body);
    if let Some(challenge) = challenge {
        buf.extend_from_slice(&challenge);
    }
    buf
}

/// A single parse step: strip the 4-byte prefix and read the response type
/// byte. Returns `None` if the datagram is too short to contain either.
fn split_header(datagram: &[u8]) -> Option<(u8, &[u8])> {
    let body = datagram.strip_prefix(&CONNECTIONLESS_PREFIX)?;
    let (&kind, rest) = body.split_first()?;
    Some((kind, rest))
}

/// Outcome of parsing one datagram in response to an info query.
#[derive(Debug)]
pub enum ParsedResponse {
    /// `A` type: the server wants the query resent with this challenge.
    Challenge([u8; 4]),
    /// `I` or `m` type parsed into server info.
    Info(ServerInfo),
    /// Any other type, or a body too short to parse: empty info.
    Empty,
}

/// Parse one received datagram per spec §4.C step 4.
#[must_use]
pub fn parse_response(datagram: &[u8]) -> ParsedResponse {
    let Some((kind, body)) = split_header(datagram) else {
        return ParsedResponse::Empty;
    };

    match kind {
        TYPE_CHALLENGE => match body.get(0..4) {
            Some(bytes) => {
                let mut challenge = [0u8; 4];
                challenge.copy_from_slice(bytes);
                ParsedResponse::Challenge(challenge)
            }
            None => ParsedResponse::Empty,
        },
        TYPE_SOURCE_INFO => parse_source_info(body).map_or(ParsedResponse::Empty, ParsedResponse::Info),
        TYPE_LEGACY_INFO => parse_legacy_info(body).map_or(ParsedResponse::Empty, ParsedResponse::Info),
        _ => ParsedResponse::Empty,
    }
}

/// Read a null-terminated string starting at `*offset`, advancing `*offset`
/// past the terminator. Invalid UTF-8 is lossily replaced, never rejected.
fn read_cstring(data: &[u8], offset: &mut usize) -> Option<String> {
    let start = *offset;
    let mut end = start;
    while *data.get(end)? != 0 {
        end += 1;
    }
    *offset = end + 1;
    Some(String::from_utf8_lossy(&data[start..end]).into_owned())
}

fn read_u8(data: &[u8], offset: &mut usize) -> Option<u8> {
    let byte = *data.get(*offset)?;
    *offset += 1;
    Some(byte)
}

/// `I` (Source) response: protocol byte, then name/map/folder/game strings,
/// a 2-byte app id, then players/max_players bytes.
fn parse_source_info(body: &[u8]) -> Option<ServerInfo> {
    let mut offset = 0usize;
    let _protocol = read_u8(body, &mut offset)?;
    let name = read_cstring(body, &mut offset)?;
    let map = read_cstring(body, &mut offset)?;
    let folder = read_cstring(body, &mut offset)?;
    let game = read_cstring(body, &mut offset)?;
    offset = offset.checked_add(2)?; // app id, unused
    let players = read_u8(body, &mut offset)?;
    let max_players = read_u8(body, &mut offset)?;

    Some(ServerInfo {
        name,
        map,
        folder,
        game,
        players,
        max_players,
    })
}

/// `m` (legacy GoldSrc) response: backslash-delimited key/value text. The
/// exact key set is heuristic per mod (spec §9 open question); on any
/// missing required key this falls back to `None` rather than fabricating
/// fields, and the caller reports the probe as offline.
fn parse_legacy_info(body: &[u8]) -> Option<ServerInfo> {
    let text = String::from_utf8_lossy(body);
    let mut fields: std::collections::HashMap<&str, &str> = std::collections::HashMap::new();
    let mut parts = text.split('\\').filter(|s| !s.is_empty());
    while let (Some(key), Some(value)) = (parts.next(), parts.next()) {
        fields.insert(key, value);
    }

    let name = (*fields.get("hostname")?).to_string();
    let map = (*fields.get("map")?).to_string();
    let players: u8 = fields.get("players")?.parse().ok()?;
    let max_players: u8 = fields.get("max")?.parse().ok()?;

    Some(ServerInfo {
        name,
        map,
        folder: String::new(),
        game: fields.get("gamedir").map(|s| (*s).to_string()).unwrap_or_default(),
        players,
        max_players,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_info_datagram() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&CONNECTIONLESS_PREFIX);
        buf.push(TYPE_SOURCE_INFO);
        buf.push(0x11); // protocol
        buf.extend_from_slice(b"srv\0");
        buf.extend_from_slice(b"de_dust2\0");
        buf.extend_from_slice(b"cstrike\0");
        buf.extend_from_slice(b"Counter-Strike\0");
        buf.extend_from_slice(&[0x01, 0x00]); // app id
        buf.push(5); // players
        buf.push(16); // max_players
        buf
    }

    #[test]
    fn parses_source_info_response() {
        let datagram = source_info_datagram();
        match parse_response(&datagram) {
            ParsedResponse::Info(info) => {
                assert_eq!(info.name, "srv");
                assert_eq!(info.map, "de_dust2");
                assert_eq!(info.folder, "cstrike");
                assert_eq!(info.game, "Counter-Strike");
                assert_eq!(info.players, 5);
                assert_eq!(info.max_players, 16);
            }
            other => panic!("expected Info, got {other:?}"),
        }
    }

    #[test]
    fn parses_challenge_response() {
        let mut datagram = Vec::new();
        datagram.extend_from_slice(&CONNECTIONLESS_PREFIX);
        datagram.push(TYPE_CHALLENGE);
        datagram.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        match parse_response(&datagram) {
            ParsedResponse::Challenge(bytes) => assert_eq!(bytes, [0xDE, 0xAD, 0xBE, 0xEF]),
            other => panic!("expected Challenge, got {other:?}"),
        }
    }

    #[test]
    fn parses_legacy_info_response() {
        let mut datagram = Vec::new();
        datagram.extend_from_slice(&CONNECTIONLESS_PREFIX);
        datagram.push(TYPE_LEGACY_INFO);
        datagram.extend_from_slice(b"\\hostname\\legacy srv\\map\\crossfire\\players\\2\\max\\8\\");
        match parse_response(&datagram) {
            ParsedResponse::Info(info) => {
                assert_eq!(info.name, "legacy srv");
                assert_eq!(info.map, "crossfire");
                assert_eq!(info.players, 2);
                assert_eq!(info.max_players, 8);
            }
            other => panic!("expected Info, got {other:?}"),
        }
    }

    #[test]
    fn legacy_info_falls_back_to_empty_on_missing_keys() {
        let mut datagram = Vec::new();
        datagram.extend_from_slice(&CONNECTIONLESS_PREFIX);
        datagram.push(TYPE_LEGACY_INFO);
        datagram.extend_from_slice(b"\\hostname\\no players key\\");
        assert!(matches!(parse_response(&datagram), ParsedResponse::Empty));
    }

    #[test]
    fn unknown_type_is_empty() {
        let mut datagram = Vec::new();
        datagram.extend_from_slice(&CONNECTIONLESS_PREFIX);
        datagram.push(0x99);
        assert!(matches!(parse_response(&datagram), ParsedResponse::Empty));
    }

    #[test]
    fn short_datagram_is_empty() {
        assert!(matches!(parse_response(&[0xFF, 0xFF]), ParsedResponse::Empty));
    }
}
